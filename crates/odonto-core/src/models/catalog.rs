//! Treatment catalog models.

use serde::{Deserialize, Serialize};

/// Collection holding the treatment catalog.
pub const TREATMENTS_COLLECTION: &str = "tratamientos_dentales";

/// A billable dental treatment offered by the practice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Treatment {
    /// Record ID
    pub id: String,
    /// Display name (e.g., "Resina", "Endodoncia")
    pub name: String,
    /// Unit price
    pub price: f64,
    /// Practice billing code
    #[serde(default)]
    pub code: Option<String>,
    /// Whether this treatment is still offered
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Treatment {
    /// Create a new catalog entry with a fresh ID.
    pub fn new(name: String, price: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            price,
            code: None,
            active: true,
        }
    }

    /// Check if the price can be billed.
    pub fn has_valid_price(&self) -> bool {
        self.price.is_finite() && self.price >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_treatment() {
        let t = Treatment::new("Limpieza".into(), 500.0);
        assert_eq!(t.name, "Limpieza");
        assert!(t.active);
        assert_eq!(t.id.len(), 36);
    }

    #[test]
    fn test_price_validation() {
        let mut t = Treatment::new("Limpieza".into(), 500.0);
        assert!(t.has_valid_price());
        t.price = -1.0;
        assert!(!t.has_valid_price());
        t.price = f64::NAN;
        assert!(!t.has_valid_price());
    }

    #[test]
    fn test_active_defaults_when_missing() {
        let t: Treatment =
            serde_json::from_str(r#"{"id":"x","name":"Corona","price":3500}"#).unwrap();
        assert!(t.active);
        assert_eq!(t.code, None);
    }
}
