//! Appointment book: the clinic calendar for one session.
//!
//! Appointments are stored one record each. Changes are tracked by ID and
//! only the touched records are written on flush.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::db::{to_fields, CollectionStore, DbError, DbResult, ListQuery};
use crate::models::{Appointment, AppointmentStatus, Patient, APPOINTMENTS_COLLECTION};

/// Session view of the appointment calendar.
pub struct AppointmentBook<'s, S: CollectionStore + ?Sized> {
    store: &'s S,
    appointments: Vec<Appointment>,
    dirty: BTreeSet<String>,
}

impl<'s, S: CollectionStore + ?Sized> AppointmentBook<'s, S> {
    /// Load every stored appointment, in calendar order.
    pub fn load(store: &'s S) -> DbResult<Self> {
        let records = store.list(APPOINTMENTS_COLLECTION, &ListQuery::new().sort("date,time"))?;
        let appointments = records
            .iter()
            .map(|r| r.decode())
            .collect::<DbResult<Vec<Appointment>>>()?;
        debug!(count = appointments.len(), "loaded appointment book");

        Ok(Self {
            store,
            appointments,
            dirty: BTreeSet::new(),
        })
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn get(&self, id: &str) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    /// Appointments on a day, by start time.
    pub fn on_date(&self, date: NaiveDate) -> Vec<&Appointment> {
        let mut day: Vec<&Appointment> = self.appointments.iter().filter(|a| a.date == date).collect();
        day.sort_by_key(|a| a.time);
        day
    }

    pub fn for_patient(&self, patient: &Patient) -> Vec<&Appointment> {
        self.appointments.iter().filter(|a| a.is_for(patient)).collect()
    }

    /// Add an appointment and flush it.
    pub fn schedule(&mut self, appointment: Appointment) -> DbResult<()> {
        if appointment.duration_minutes == 0 {
            return Err(DbError::Validation("appointment duration must be positive".into()));
        }
        if appointment.patient.is_none() && appointment.patient_name.trim().is_empty() {
            return Err(DbError::Validation("appointment needs a patient or a name".into()));
        }
        if self.get(&appointment.id).is_some() {
            return Err(DbError::Validation(format!(
                "appointment {} already exists",
                appointment.id
            )));
        }
        self.dirty.insert(appointment.id.clone());
        self.appointments.push(appointment);
        self.appointments.sort_by_key(|a| (a.date, a.time));
        self.flush()
    }

    /// Change an appointment's status and flush it.
    pub fn set_status(&mut self, id: &str, status: AppointmentStatus) -> DbResult<Appointment> {
        let appointment = self
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| DbError::NotFound(format!("appointment {}", id)))?;
        appointment.status = status;
        let updated = appointment.clone();
        self.dirty.insert(id.to_string());
        self.flush()?;
        Ok(updated)
    }

    /// Mark the patient's appointments on `date` as completed by a
    /// consultation. Appointments already completed this way are left alone.
    /// Returns how many changed.
    pub fn complete_consultation(&mut self, patient: &Patient, date: NaiveDate) -> DbResult<usize> {
        let mut completed = 0;
        for appointment in self
            .appointments
            .iter_mut()
            .filter(|a| a.date == date && a.is_for(patient) && !a.consultation_completed)
        {
            appointment.consultation_completed = true;
            appointment.status = AppointmentStatus::Completed;
            self.dirty.insert(appointment.id.clone());
            completed += 1;
        }
        if completed > 0 {
            info!(patient = %patient.id, %date, completed, "completed appointments");
            self.flush()?;
        }
        Ok(completed)
    }

    /// Write every changed appointment.
    pub fn flush(&mut self) -> DbResult<()> {
        for id in std::mem::take(&mut self.dirty) {
            let Some(appointment) = self.appointments.iter().find(|a| a.id == id) else {
                continue;
            };
            let fields = to_fields(appointment)?;
            if self.store.find(APPOINTMENTS_COLLECTION, &id)?.is_some() {
                self.store.update(APPOINTMENTS_COLLECTION, &id, fields)?;
            } else {
                self.store.create(APPOINTMENTS_COLLECTION, fields)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, PatientRepository};
    use chrono::NaiveTime;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn at(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn setup_db() -> (Database, Patient) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Ana".into(), "Martínez".into());
        db.records().insert_patient(&patient).unwrap();
        (db, patient)
    }

    #[test]
    fn test_schedule_persists_in_calendar_order() {
        let (db, patient) = setup_db();
        let store = db.records();
        let mut book = AppointmentBook::load(&store).unwrap();

        book.schedule(Appointment::for_patient(&patient, day(3), at(12))).unwrap();
        book.schedule(Appointment::for_patient(&patient, day(3), at(9))).unwrap();
        book.schedule(Appointment::for_patient(&patient, day(1), at(16))).unwrap();

        let reloaded = AppointmentBook::load(&store).unwrap();
        let slots: Vec<(NaiveDate, NaiveTime)> =
            reloaded.appointments().iter().map(|a| (a.date, a.time)).collect();
        assert_eq!(slots, vec![(day(1), at(16)), (day(3), at(9)), (day(3), at(12))]);
        assert_eq!(reloaded.on_date(day(3)).len(), 2);
    }

    #[test]
    fn test_schedule_validates() {
        let (db, patient) = setup_db();
        let store = db.records();
        let mut book = AppointmentBook::load(&store).unwrap();

        let mut zero = Appointment::for_patient(&patient, day(3), at(9));
        zero.duration_minutes = 0;
        assert!(matches!(book.schedule(zero).unwrap_err(), DbError::Validation(_)));

        let appt = Appointment::for_patient(&patient, day(3), at(9));
        book.schedule(appt.clone()).unwrap();
        assert!(book.schedule(appt).is_err());
    }

    #[test]
    fn test_complete_consultation_only_touches_today() {
        let (db, patient) = setup_db();
        let other = Patient::new("Luis".into(), "Pérez".into());
        let store = db.records();
        let mut book = AppointmentBook::load(&store).unwrap();

        let today = Appointment::for_patient(&patient, day(3), at(9));
        let mut by_name = Appointment::for_patient(&patient, day(3), at(17));
        by_name.patient = None;
        let tomorrow = Appointment::for_patient(&patient, day(4), at(9));
        let someone_else = Appointment::for_patient(&other, day(3), at(10));
        for a in [&today, &by_name, &tomorrow, &someone_else] {
            book.schedule(a.clone()).unwrap();
        }

        assert_eq!(book.complete_consultation(&patient, day(3)).unwrap(), 2);
        assert_eq!(book.complete_consultation(&patient, day(3)).unwrap(), 0);

        let reloaded = AppointmentBook::load(&store).unwrap();
        let status = |id: &str| reloaded.get(id).unwrap().status;
        assert_eq!(status(&today.id), AppointmentStatus::Completed);
        assert_eq!(status(&by_name.id), AppointmentStatus::Completed);
        assert!(reloaded.get(&by_name.id).unwrap().consultation_completed);
        assert_eq!(status(&tomorrow.id), AppointmentStatus::Scheduled);
        assert_eq!(status(&someone_else.id), AppointmentStatus::Scheduled);
    }

    #[test]
    fn test_set_status() {
        let (db, patient) = setup_db();
        let store = db.records();
        let mut book = AppointmentBook::load(&store).unwrap();
        let appt = Appointment::for_patient(&patient, day(3), at(9));
        book.schedule(appt.clone()).unwrap();

        let updated = book.set_status(&appt.id, AppointmentStatus::Confirmed).unwrap();
        assert_eq!(updated.status, AppointmentStatus::Confirmed);
        assert!(matches!(
            book.set_status("missing", AppointmentStatus::Cancelled).unwrap_err(),
            DbError::NotFound(_)
        ));

        let reloaded = AppointmentBook::load(&store).unwrap();
        assert_eq!(reloaded.get(&appt.id).unwrap().status, AppointmentStatus::Confirmed);
    }
}
