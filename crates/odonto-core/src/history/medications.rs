//! Recently prescribed medications offered as suggestions when writing a
//! new prescription. Kept as a single record so a session sees one
//! consistent list.

use serde_json::{Map, Value};
use tracing::debug;

use crate::db::{CollectionStore, DbError, DbResult};
use crate::matching::rank_by_name;
use crate::models::Prescription;

pub const MEDICATION_HISTORY_COLLECTION: &str = "medication_history";

/// Record holding the list.
const HISTORY_RECORD_ID: &str = "medications";

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Session view of the medication history.
pub struct MedicationHistory<'s, S: CollectionStore + ?Sized> {
    store: &'s S,
    capacity: usize,
    entries: Vec<Prescription>,
}

impl<'s, S: CollectionStore + ?Sized> MedicationHistory<'s, S> {
    /// Load the stored history.
    pub fn load(store: &'s S, capacity: usize) -> DbResult<Self> {
        let mut entries: Vec<Prescription> = match store.find(MEDICATION_HISTORY_COLLECTION, HISTORY_RECORD_ID)? {
            Some(record) => match record.fields.get("entries") {
                Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                    DbError::Validation(format!("malformed medication history: {}", e))
                })?,
                None => Vec::new(),
            },
            None => Vec::new(),
        };
        entries.truncate(capacity);
        debug!(count = entries.len(), "loaded medication history");

        Ok(Self {
            store,
            capacity,
            entries,
        })
    }

    /// Newest first.
    pub fn entries(&self) -> &[Prescription] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn contains(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.entries
            .iter()
            .any(|m| m.name.trim().to_lowercase() == name)
    }

    /// Add without flushing. Returns true if the list changed.
    fn push_front(&mut self, medication: &Prescription) -> bool {
        if medication.name.trim().is_empty() || self.contains(&medication.name) {
            return false;
        }
        self.entries.insert(0, medication.clone());
        self.entries.truncate(self.capacity);
        true
    }

    /// Remember a prescribed medication. Unnamed medications and names
    /// already in the history (ignoring case) are skipped.
    pub fn remember(&mut self, medication: &Prescription) -> DbResult<bool> {
        if !self.push_front(medication) {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Remember every medication of a prescription list with one flush.
    pub fn remember_all<'m>(
        &mut self,
        medications: impl IntoIterator<Item = &'m Prescription>,
    ) -> DbResult<usize> {
        let added = medications
            .into_iter()
            .filter(|m| self.push_front(m))
            .count();
        if added > 0 {
            self.flush()?;
        }
        Ok(added)
    }

    /// Suggestions for a partially typed name, best first. An empty query
    /// returns the most recent entries.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<Prescription> {
        if query.trim().is_empty() {
            return self.entries.iter().take(limit).cloned().collect();
        }
        rank_by_name(query, self.entries.clone(), |m| m.name.as_str())
            .into_iter()
            .take(limit)
            .map(|(m, _)| m)
            .collect()
    }

    pub fn clear(&mut self) -> DbResult<()> {
        self.entries.clear();
        self.flush()
    }

    fn flush(&self) -> DbResult<()> {
        let mut fields = Map::new();
        fields.insert("entries".into(), serde_json::to_value(&self.entries)?);

        if self.store.find(MEDICATION_HISTORY_COLLECTION, HISTORY_RECORD_ID)?.is_some() {
            self.store
                .update(MEDICATION_HISTORY_COLLECTION, HISTORY_RECORD_ID, fields)?;
        } else {
            fields.insert("id".into(), Value::String(HISTORY_RECORD_ID.into()));
            self.store.create(MEDICATION_HISTORY_COLLECTION, fields)?;
        }
        debug!(count = self.entries.len(), "flushed medication history");
        Ok(())
    }
}
