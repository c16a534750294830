//! Odontogram selection state.
//!
//! Selection is keyed by the same tooth numbers as the periodontal chart but
//! is stored and edited independently of it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::budget::BudgetItem;
use super::catalog::Treatment;
use super::tooth::ToothNumber;

/// Status of a treatment assigned to a tooth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl TreatmentStatus {
    /// Highlight color used on the chart, if any.
    pub fn highlight(&self) -> Option<&'static str> {
        match self {
            TreatmentStatus::Planned => Some("blue"),
            TreatmentStatus::Completed => Some("green"),
            TreatmentStatus::InProgress | TreatmentStatus::Cancelled => None,
        }
    }
}

/// A treatment annotation on a tooth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToothTreatment {
    /// Catalog treatment ID
    pub treatment_id: String,
    /// Catalog treatment name at time of assignment
    pub treatment_name: String,
    /// Catalog price at time of assignment
    pub price: f64,
    /// Catalog code
    pub code: Option<String>,
    /// Assignment timestamp
    pub date: String,
    pub status: TreatmentStatus,
}

/// Selected teeth and their treatment annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OdontogramSelection {
    #[serde(default)]
    selected: BTreeSet<ToothNumber>,
    #[serde(default)]
    annotations: BTreeMap<ToothNumber, ToothTreatment>,
}

impl OdontogramSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a tooth. Returns false if it was already selected.
    pub fn select(&mut self, tooth: ToothNumber) -> bool {
        self.selected.insert(tooth)
    }

    /// Deselect a tooth; its annotation is kept.
    pub fn deselect(&mut self, tooth: ToothNumber) -> bool {
        self.selected.remove(&tooth)
    }

    /// Flip selection; returns the new state.
    pub fn toggle(&mut self, tooth: ToothNumber) -> bool {
        if self.selected.remove(&tooth) {
            false
        } else {
            self.selected.insert(tooth);
            true
        }
    }

    pub fn is_selected(&self, tooth: ToothNumber) -> bool {
        self.selected.contains(&tooth)
    }

    pub fn selected(&self) -> impl Iterator<Item = ToothNumber> + '_ {
        self.selected.iter().copied()
    }

    /// Assign a catalog treatment to a tooth as planned and select it.
    pub fn annotate(&mut self, tooth: ToothNumber, treatment: &Treatment) -> &ToothTreatment {
        self.selected.insert(tooth);
        let entry = ToothTreatment {
            treatment_id: treatment.id.clone(),
            treatment_name: treatment.name.clone(),
            price: treatment.price,
            code: treatment.code.clone(),
            date: chrono::Utc::now().to_rfc3339(),
            status: TreatmentStatus::Planned,
        };
        self.annotations.insert(tooth, entry);
        &self.annotations[&tooth]
    }

    /// Update the status of an existing annotation.
    pub fn set_status(&mut self, tooth: ToothNumber, status: TreatmentStatus) -> bool {
        match self.annotations.get_mut(&tooth) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    pub fn clear_annotation(&mut self, tooth: ToothNumber) -> Option<ToothTreatment> {
        self.annotations.remove(&tooth)
    }

    pub fn annotation(&self, tooth: ToothNumber) -> Option<&ToothTreatment> {
        self.annotations.get(&tooth)
    }

    pub fn annotations(&self) -> impl Iterator<Item = (ToothNumber, &ToothTreatment)> {
        self.annotations.iter().map(|(t, a)| (*t, a))
    }

    /// Chart highlight color per annotated tooth.
    pub fn highlight_colors(&self) -> BTreeMap<ToothNumber, &'static str> {
        self.annotations
            .iter()
            .filter_map(|(tooth, entry)| entry.status.highlight().map(|c| (*tooth, c)))
            .collect()
    }

    /// Planned annotations as budget line items, in tooth order.
    pub fn planned_budget_items(&self) -> Vec<BudgetItem> {
        self.annotations
            .iter()
            .filter(|(_, entry)| entry.status == TreatmentStatus::Planned)
            .map(|(tooth, entry)| BudgetItem {
                treatment_id: Some(entry.treatment_id.clone()),
                name: entry.treatment_name.clone(),
                price: entry.price,
                code: entry.code.clone(),
                tooth: Some(*tooth),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tooth(n: u8) -> ToothNumber {
        ToothNumber::new(n).unwrap()
    }

    fn resin() -> Treatment {
        let mut t = Treatment::new("Resina".into(), 800.0);
        t.code = Some("RES-01".into());
        t
    }

    #[test]
    fn test_toggle_selection() {
        let mut selection = OdontogramSelection::new();
        assert!(selection.toggle(tooth(36)));
        assert!(selection.is_selected(tooth(36)));
        assert!(!selection.toggle(tooth(36)));
        assert!(!selection.is_selected(tooth(36)));
    }

    #[test]
    fn test_annotate_selects_and_plans() {
        let mut selection = OdontogramSelection::new();
        let entry = selection.annotate(tooth(11), &resin());
        assert_eq!(entry.status, TreatmentStatus::Planned);
        assert!(selection.is_selected(tooth(11)));
    }

    #[test]
    fn test_deselect_keeps_annotation() {
        let mut selection = OdontogramSelection::new();
        selection.annotate(tooth(11), &resin());
        selection.deselect(tooth(11));
        assert!(!selection.is_selected(tooth(11)));
        assert!(selection.annotation(tooth(11)).is_some());
    }

    #[test]
    fn test_highlight_colors() {
        let mut selection = OdontogramSelection::new();
        selection.annotate(tooth(11), &resin());
        selection.annotate(tooth(21), &resin());
        selection.annotate(tooth(31), &resin());
        selection.set_status(tooth(21), TreatmentStatus::Completed);
        selection.set_status(tooth(31), TreatmentStatus::Cancelled);

        let colors = selection.highlight_colors();
        assert_eq!(colors.get(&tooth(11)), Some(&"blue"));
        assert_eq!(colors.get(&tooth(21)), Some(&"green"));
        assert!(!colors.contains_key(&tooth(31)));
    }

    #[test]
    fn test_planned_budget_items() {
        let mut selection = OdontogramSelection::new();
        selection.annotate(tooth(46), &resin());
        selection.annotate(tooth(16), &resin());
        selection.annotate(tooth(26), &resin());
        selection.set_status(tooth(26), TreatmentStatus::Completed);

        let items = selection.planned_budget_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].tooth, Some(tooth(16)));
        assert_eq!(items[1].tooth, Some(tooth(46)));
        assert_eq!(items[0].code.as_deref(), Some("RES-01"));
    }

    #[test]
    fn test_set_status_missing_annotation() {
        let mut selection = OdontogramSelection::new();
        assert!(!selection.set_status(tooth(11), TreatmentStatus::Completed));
    }
}
