//! Appointments on the clinic calendar.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::patient::Patient;

/// Collection holding appointments.
pub const APPOINTMENTS_COLLECTION: &str = "appointments";

/// Calendar slot length when none is given, in minutes.
pub const DEFAULT_APPOINTMENT_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Attended,
    /// A consultation was recorded for it
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Attended => "attended",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// Calendar color.
    pub fn color(&self) -> &'static str {
        match self {
            AppointmentStatus::Confirmed => "#10b981",
            AppointmentStatus::Attended | AppointmentStatus::Completed => "#3b82f6",
            AppointmentStatus::Cancelled => "#ef4444",
            AppointmentStatus::NoShow => "#f59e0b",
            AppointmentStatus::Scheduled => "#6366f1",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    /// Patient record ID; walk-ins may only have a name
    #[serde(default)]
    pub patient: Option<String>,
    pub patient_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    #[serde(default = "default_reason")]
    pub reason: String,
    #[serde(default)]
    pub notes: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub consultation_completed: bool,
}

fn default_duration() -> u32 { DEFAULT_APPOINTMENT_MINUTES }
fn default_reason() -> String { "Consulta General".to_string() }

impl Appointment {
    /// A scheduled appointment for a registered patient.
    pub fn for_patient(patient: &Patient, date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient: Some(patient.id.clone()),
            patient_name: patient.full_name(),
            phone: patient.phone.clone(),
            date,
            time,
            duration_minutes: DEFAULT_APPOINTMENT_MINUTES,
            reason: default_reason(),
            notes: String::new(),
            status: AppointmentStatus::Scheduled,
            consultation_completed: false,
        }
    }

    /// Whether this appointment belongs to the patient, by record ID or, for
    /// appointments booked by name only, by full name.
    pub fn is_for(&self, patient: &Patient) -> bool {
        match &self.patient {
            Some(id) => *id == patient.id,
            None => self.patient_name.trim() == patient.full_name(),
        }
    }

    pub fn end_time(&self) -> NaiveTime {
        self.time + chrono::Duration::minutes(i64::from(self.duration_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_for_patient_defaults() {
        let patient = Patient::new("Ana".into(), "Martínez".into());
        let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let appt = Appointment::for_patient(&patient, day, at(9, 30));

        assert_eq!(appt.patient_name, "Ana Martínez");
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.end_time(), at(10, 0));
        assert!(appt.is_for(&patient));
    }

    #[test]
    fn test_name_only_match() {
        let patient = Patient::new("Ana".into(), "Martínez".into());
        let other = Patient::new("Luis".into(), "Pérez".into());
        let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();

        let mut walk_in = Appointment::for_patient(&patient, day, at(11, 0));
        walk_in.patient = None;
        assert!(walk_in.is_for(&patient));
        assert!(!walk_in.is_for(&other));
    }
}
