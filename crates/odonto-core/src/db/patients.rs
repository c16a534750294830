//! Patient repository.

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{quote, to_fields, CollectionStore, DbError, DbResult, ListQuery};
use crate::models::{Patient, PATIENTS_COLLECTION};

/// Patient operations over any collection store.
pub trait PatientRepository: CollectionStore {
    /// Insert a new patient.
    fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.create(PATIENTS_COLLECTION, to_fields(patient)?)?;
        Ok(())
    }

    /// Replace a patient's fields. Returns false if the patient does not exist.
    fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let mut patient = patient.clone();
        patient.updated_at = Utc::now().to_rfc3339();
        match self.update(PATIENTS_COLLECTION, &patient.id, to_fields(&patient)?) {
            Ok(_) => Ok(true),
            Err(DbError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get a patient by ID.
    fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.find(PATIENTS_COLLECTION, id)?
            .map(|record| record.decode())
            .transpose()
    }

    /// Search patients by name (case-insensitive substring).
    fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let q = quote(query.trim());
        let filter = format!("first_name ~ {} || last_name ~ {}", q, q);
        let records = self.list(
            PATIENTS_COLLECTION,
            &ListQuery::new()
                .filter(filter)
                .sort("last_name,first_name")
                .limit(limit),
        )?;
        records.iter().map(|r| r.decode()).collect()
    }

    /// List all patients by last name.
    fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let records = self.list(
            PATIENTS_COLLECTION,
            &ListQuery::new().sort("last_name,first_name"),
        )?;
        records.iter().map(|r| r.decode()).collect()
    }

    /// Delete a patient.
    fn delete_patient(&self, id: &str) -> DbResult<bool> {
        match self.delete(PATIENTS_COLLECTION, id) {
            Ok(()) => Ok(true),
            Err(DbError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Add `delta` to the outstanding balance. Returns the new balance.
    fn adjust_balance(&self, id: &str, delta: f64) -> DbResult<f64> {
        if !delta.is_finite() {
            return Err(DbError::Validation(format!(
                "balance delta must be finite, got {}",
                delta
            )));
        }
        let record = self.get(PATIENTS_COLLECTION, id)?;
        let current = record
            .fields
            .get("balance")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let balance = current + delta;

        let mut fields = Map::new();
        fields.insert("balance".into(), json!(balance));
        fields.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
        self.update(PATIENTS_COLLECTION, id, fields)?;

        debug!(patient = id, before = current, after = balance, "adjusted balance");
        Ok(balance)
    }

    /// Overwrite the balance. Used by reconciliation.
    fn set_balance(&self, id: &str, balance: f64) -> DbResult<()> {
        let mut fields = Map::new();
        fields.insert("balance".into(), json!(balance));
        fields.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
        self.update(PATIENTS_COLLECTION, id, fields)?;
        Ok(())
    }

    /// Record the time of the patient's latest visit.
    fn touch_last_visit(&self, id: &str, when: &str) -> DbResult<()> {
        let mut fields = Map::new();
        fields.insert("last_visit".into(), json!(when));
        self.update(PATIENTS_COLLECTION, id, fields)?;
        Ok(())
    }
}

impl<S: CollectionStore + ?Sized> PatientRepository for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let store = db.records();

        let mut patient = Patient::new("María".into(), "López".into());
        patient.phone = Some("555-0101".into());
        patient.allergies = Some("Penicilina".into());
        store.insert_patient(&patient).unwrap();

        let retrieved = store.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved, patient);
        assert!(store.get_patient("missing").unwrap().is_none());
    }

    #[test]
    fn test_update_patient() {
        let db = setup_db();
        let store = db.records();

        let mut patient = Patient::new("María".into(), "López".into());
        store.insert_patient(&patient).unwrap();

        patient.email = Some("maria@example.com".into());
        assert!(store.update_patient(&patient).unwrap());

        let retrieved = store.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.email, Some("maria@example.com".into()));

        let ghost = Patient::new("No".into(), "One".into());
        assert!(!store.update_patient(&ghost).unwrap());
    }

    #[test]
    fn test_search_patients() {
        let db = setup_db();
        let store = db.records();

        store.insert_patient(&Patient::new("Ana".into(), "Martínez".into())).unwrap();
        store.insert_patient(&Patient::new("Mariana".into(), "Ruiz".into())).unwrap();
        store.insert_patient(&Patient::new("Luis".into(), "Pérez".into())).unwrap();

        let results = store.search_patients("ana", 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].last_name, "Martínez");
        assert_eq!(results[1].last_name, "Ruiz");

        assert_eq!(store.search_patients("ana", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_adjust_balance() {
        let db = setup_db();
        let store = db.records();
        let patient = Patient::new("Ana".into(), "Martínez".into());
        store.insert_patient(&patient).unwrap();

        assert_eq!(store.adjust_balance(&patient.id, 1320.0).unwrap(), 1320.0);
        assert_eq!(store.adjust_balance(&patient.id, -220.0).unwrap(), 1100.0);
        let retrieved = store.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.balance, 1100.0);
        assert!(retrieved.has_debt());

        assert!(matches!(
            store.adjust_balance("missing", 1.0).unwrap_err(),
            DbError::NotFound(_)
        ));
        assert!(matches!(
            store.adjust_balance(&patient.id, f64::NAN).unwrap_err(),
            DbError::Validation(_)
        ));
    }

    #[test]
    fn test_touch_last_visit_and_delete() {
        let db = setup_db();
        let store = db.records();
        let patient = Patient::new("Ana".into(), "Martínez".into());
        store.insert_patient(&patient).unwrap();

        store.touch_last_visit(&patient.id, "2024-05-01T10:00:00Z").unwrap();
        let retrieved = store.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.last_visit.as_deref(), Some("2024-05-01T10:00:00Z"));

        assert!(store.delete_patient(&patient.id).unwrap());
        assert!(!store.delete_patient(&patient.id).unwrap());
        assert!(store.list_patients().unwrap().is_empty());
    }
}
