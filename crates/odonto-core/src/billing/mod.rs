//! Budget billing: payment plans, the budget lifecycle and the balance ledger.

mod calculator;
mod ledger;
mod service;

pub use calculator::*;
pub use ledger::*;
pub use service::*;

use thiserror::Error;

use crate::db::DbError;
use crate::models::BudgetStatus;

/// Billing errors.
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Cannot move budget from {from} to {to}")]
    InvalidTransition { from: BudgetStatus, to: BudgetStatus },

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

impl From<rusqlite::Error> for BillingError {
    fn from(err: rusqlite::Error) -> Self {
        BillingError::Store(DbError::Sqlite(err))
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
