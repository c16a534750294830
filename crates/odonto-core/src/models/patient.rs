//! Patient models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Collection holding patients.
pub const PATIENTS_COLLECTION: &str = "patients";

/// A patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Record ID
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Date of birth (YYYY-MM-DD)
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Outstanding balance owed to the practice
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub pathological_history: Option<String>,
    #[serde(default)]
    pub non_pathological_history: Option<String>,
    /// Timestamp of the latest consultation
    #[serde(default)]
    pub last_visit: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required fields and a zero balance.
    pub fn new(first_name: String, last_name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            first_name,
            last_name,
            date_of_birth: None,
            phone: None,
            email: None,
            balance: 0.0,
            allergies: None,
            pathological_history: None,
            non_pathological_history: None,
            last_visit: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on the given date, if the birth date parses.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        let birth = NaiveDate::parse_from_str(self.date_of_birth.as_deref()?, "%Y-%m-%d").ok()?;
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        Some(age)
    }

    /// Check if the patient owes money.
    pub fn has_debt(&self) -> bool {
        self.balance > 0.0
    }
}
