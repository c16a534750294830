//! Consultation repository.

use tracing::warn;

use super::{quote, to_fields, CollectionStore, DbError, DbResult, ListQuery, PatientRepository};
use crate::models::{Consultation, CONSULTATIONS_COLLECTION};

/// Consultation operations over any collection store.
pub trait ConsultationRepository: PatientRepository {
    /// Insert a consultation and stamp the patient's last visit.
    ///
    /// A missing patient record does not block the consultation.
    fn insert_consultation(&self, consultation: &Consultation) -> DbResult<()> {
        self.create(CONSULTATIONS_COLLECTION, to_fields(consultation)?)?;
        match self.touch_last_visit(&consultation.patient, &consultation.created_at) {
            Ok(()) => Ok(()),
            Err(DbError::NotFound(_)) => {
                warn!(
                    patient = %consultation.patient,
                    consultation = %consultation.id,
                    "consultation saved for unknown patient"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn get_consultation(&self, id: &str) -> DbResult<Option<Consultation>> {
        self.find(CONSULTATIONS_COLLECTION, id)?
            .map(|record| record.decode())
            .transpose()
    }

    /// A patient's consultations, newest first.
    fn list_consultations_for_patient(&self, patient_id: &str) -> DbResult<Vec<Consultation>> {
        let records = self.list(
            CONSULTATIONS_COLLECTION,
            &ListQuery::new()
                .filter(format!("patient = {}", quote(patient_id)))
                .sort("-created"),
        )?;
        records.iter().map(|r| r.decode()).collect()
    }

    /// Follow-ups of a consultation, oldest first.
    fn list_follow_ups(&self, consultation_id: &str) -> DbResult<Vec<Consultation>> {
        let records = self.list(
            CONSULTATIONS_COLLECTION,
            &ListQuery::new()
                .filter(format!("parent_id = {}", quote(consultation_id)))
                .sort("created"),
        )?;
        records.iter().map(|r| r.decode()).collect()
    }
}

impl<S: CollectionStore + ?Sized> ConsultationRepository for S {}
