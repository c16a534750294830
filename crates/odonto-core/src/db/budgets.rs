//! Budget repository.

use super::{quote, to_fields, CollectionStore, DbResult, ListQuery};
use crate::models::{Budget, BudgetStatus, BUDGETS_COLLECTION};

/// Budget persistence over any collection store.
///
/// Status changes go through `BudgetService`, which keeps the patient
/// balance in step; these calls only move records.
pub trait BudgetRepository: CollectionStore {
    fn insert_budget(&self, budget: &Budget) -> DbResult<()> {
        self.create(BUDGETS_COLLECTION, to_fields(budget)?)?;
        Ok(())
    }

    fn get_budget(&self, id: &str) -> DbResult<Option<Budget>> {
        self.find(BUDGETS_COLLECTION, id)?
            .map(|record| record.decode())
            .transpose()
    }

    /// Write back every field. Fails with `NotFound` if the budget is gone.
    fn update_budget(&self, budget: &Budget) -> DbResult<()> {
        self.update(BUDGETS_COLLECTION, &budget.id, to_fields(budget)?)?;
        Ok(())
    }

    /// A patient's budgets, newest first.
    fn list_budgets_for_patient(&self, patient_id: &str) -> DbResult<Vec<Budget>> {
        let records = self.list(
            BUDGETS_COLLECTION,
            &ListQuery::new()
                .filter(format!("patient = {}", quote(patient_id)))
                .sort("-created"),
        )?;
        records.iter().map(|r| r.decode()).collect()
    }

    /// Budgets in a given status across all patients, newest first.
    fn list_budgets_by_status(&self, status: BudgetStatus) -> DbResult<Vec<Budget>> {
        let records = self.list(
            BUDGETS_COLLECTION,
            &ListQuery::new()
                .filter(format!("status = {}", quote(status.as_str())))
                .sort("-created"),
        )?;
        records.iter().map(|r| r.decode()).collect()
    }
}

impl<S: CollectionStore + ?Sized> BudgetRepository for S {}
