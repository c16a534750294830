//! Treatment catalog repository.

use super::{to_fields, CollectionStore, DbError, DbResult, ListQuery};
use crate::matching::rank_by_name;
use crate::models::{Treatment, TREATMENTS_COLLECTION};

/// A catalog search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct TreatmentMatch {
    pub treatment: Treatment,
    /// Similarity 0.0 - 1.0
    pub score: f64,
}

/// Catalog operations over any collection store.
pub trait TreatmentRepository: CollectionStore {
    /// Insert or replace a catalog entry.
    fn upsert_treatment(&self, treatment: &Treatment) -> DbResult<()> {
        if !treatment.has_valid_price() {
            return Err(DbError::Validation(format!(
                "treatment {} has invalid price {}",
                treatment.name, treatment.price
            )));
        }
        let fields = to_fields(treatment)?;
        if self.find(TREATMENTS_COLLECTION, &treatment.id)?.is_some() {
            self.update(TREATMENTS_COLLECTION, &treatment.id, fields)?;
        } else {
            self.create(TREATMENTS_COLLECTION, fields)?;
        }
        Ok(())
    }

    /// Get a catalog entry by ID.
    fn get_treatment(&self, id: &str) -> DbResult<Option<Treatment>> {
        self.find(TREATMENTS_COLLECTION, id)?
            .map(|record| record.decode())
            .transpose()
    }

    /// Active treatments sorted by name.
    fn list_treatments(&self) -> DbResult<Vec<Treatment>> {
        let records = self.list(
            TREATMENTS_COLLECTION,
            &ListQuery::new().filter("active = true").sort("name"),
        )?;
        records.iter().map(|r| r.decode()).collect()
    }

    fn delete_treatment(&self, id: &str) -> DbResult<bool> {
        match self.delete(TREATMENTS_COLLECTION, id) {
            Ok(()) => Ok(true),
            Err(DbError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fuzzy search over active treatment names and codes, best first.
    fn search_treatments(&self, query: &str, limit: usize) -> DbResult<Vec<TreatmentMatch>> {
        let treatments = self.list_treatments()?;
        let mut by_name = rank_by_name(query, treatments.clone(), |t| t.name.as_str());

        // Exact code hits rank first
        for treatment in treatments {
            let code_hit = treatment
                .code
                .as_deref()
                .is_some_and(|code| code.eq_ignore_ascii_case(query.trim()));
            if code_hit {
                by_name.retain(|(t, _)| t.id != treatment.id);
                by_name.insert(0, (treatment, 1.0));
            }
        }

        Ok(by_name
            .into_iter()
            .take(limit)
            .map(|(treatment, score)| TreatmentMatch { treatment, score })
            .collect())
    }
}

impl<S: CollectionStore + ?Sized> TreatmentRepository for S {}
