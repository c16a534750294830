//! Consultation notes.

use serde::{Deserialize, Serialize};

use super::odontogram::OdontogramSelection;

/// Collection holding consultations.
pub const CONSULTATIONS_COLLECTION: &str = "consultations";

/// Vital signs taken at the start of a consultation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VitalSigns {
    pub systolic: Option<u32>,
    pub diastolic: Option<u32>,
    pub heart_rate: Option<u32>,
    pub temperature: Option<f64>,
    pub spo2: Option<u32>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
}

impl VitalSigns {
    /// Body mass index rounded to one decimal.
    pub fn bmi(&self) -> Option<f64> {
        let weight = self.weight_kg.filter(|w| *w > 0.0)?;
        let height_m = self.height_cm.filter(|h| *h > 0.0)? / 100.0;
        let bmi = weight / (height_m * height_m);
        Some((bmi * 10.0).round() / 10.0)
    }
}

/// A prescribed medication line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Prescription {
    pub name: String,
    pub dose: String,
    pub frequency: String,
    pub duration: String,
}

impl Prescription {
    pub fn new(name: &str, dose: &str, frequency: &str, duration: &str) -> Self {
        Self {
            name: name.into(),
            dose: dose.into(),
            frequency: frequency.into(),
            duration: duration.into(),
        }
    }
}

/// A consultation note for a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consultation {
    pub id: String,
    /// Patient record ID
    pub patient: String,
    /// Consultation this one follows up on
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub chief_complaint: String,
    #[serde(default)]
    pub vital_signs: VitalSigns,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub treatment_plan: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub medications: Vec<Prescription>,
    /// Requested lab or imaging studies
    #[serde(default)]
    pub studies: String,
    /// Odontogram snapshot taken during the visit
    #[serde(default)]
    pub odontogram: Option<OdontogramSelection>,
    pub created_at: String,
}

impl Consultation {
    pub fn new(patient: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient,
            parent_id: None,
            chief_complaint: String::new(),
            vital_signs: VitalSigns::default(),
            diagnosis: String::new(),
            treatment_plan: String::new(),
            notes: String::new(),
            medications: Vec::new(),
            studies: String::new(),
            odontogram: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Start a follow-up of an earlier consultation.
    pub fn follow_up(previous: &Consultation) -> Self {
        let mut next = Self::new(previous.patient.clone());
        next.parent_id = Some(previous.id.clone());
        next.chief_complaint = format!("Seguimiento a diagnóstico: {}", previous.diagnosis);
        next
    }

    /// Medication lines with a name filled in.
    pub fn named_medications(&self) -> impl Iterator<Item = &Prescription> {
        self.medications.iter().filter(|m| !m.name.trim().is_empty())
    }
}
