//! Budget lifecycle.
//!
//! Status changes and the matching patient balance change commit together:
//! each operation runs in one SQLite transaction that also appends the
//! balance ledger entry.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::{build_plan, BalanceChange, BalanceLedger, LedgerEntry, LedgerEntryKind, BALANCE_TOLERANCE};
use super::{BillingError, BillingResult};
use crate::db::{
    BudgetRepository, CollectionStore, Database, DbError, PatientRepository, Records,
};
use crate::models::{
    Budget, BudgetItem, BudgetStatus, OdontogramSelection, Payment, PaymentMethod, PlanType,
};

/// Outcome of a status change.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetTransition {
    pub budget: Budget,
    /// Signed change applied to the patient balance
    pub balance_delta: f64,
    /// Patient balance after the change
    pub patient_balance: f64,
}

/// Result of comparing a patient's balance with the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReport {
    pub patient: String,
    /// Balance stored on the patient record before reconciling
    pub recorded_balance: f64,
    /// Balance according to the last ledger entry
    pub ledger_balance: f64,
    /// recorded - ledger
    pub drift: f64,
    /// First entry failing verification, if the chain is broken
    pub first_broken_seq: Option<u64>,
    /// Compensating entry written to restore the ledger balance
    pub compensation: Option<LedgerEntry>,
}

impl LedgerReport {
    pub fn chain_intact(&self) -> bool {
        self.first_broken_seq.is_none()
    }
}

fn load_budget<S: CollectionStore + ?Sized>(store: &S, budget_id: &str) -> BillingResult<Budget> {
    store
        .get_budget(budget_id)?
        .ok_or_else(|| DbError::NotFound(format!("budget {}", budget_id)).into())
}

fn patient_balance<S: CollectionStore + ?Sized>(store: &S, patient_id: &str) -> BillingResult<f64> {
    store
        .get_patient(patient_id)?
        .map(|p| p.balance)
        .ok_or_else(|| DbError::NotFound(format!("patient {}", patient_id)).into())
}

/// Apply `delta` to the budget's patient and record it in the ledger.
fn apply_balance<S: CollectionStore + ?Sized>(
    store: &S,
    budget: &Budget,
    kind: LedgerEntryKind,
    delta: f64,
) -> BillingResult<f64> {
    let before = patient_balance(store, &budget.patient)?;
    let after = store.adjust_balance(&budget.patient, delta)?;
    BalanceLedger::new(store).append(BalanceChange {
        patient: &budget.patient,
        budget: Some(&budget.id),
        kind,
        balance_before: before,
        balance_after: after,
    })?;
    Ok(after)
}

/// Budget operations that keep the patient balance in step.
pub struct BudgetService<'a> {
    db: &'a Database,
}

impl<'a> BudgetService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a pending budget for an existing patient.
    pub fn create_budget(&self, patient_id: &str, items: Vec<BudgetItem>) -> BillingResult<Budget> {
        if items.is_empty() {
            return Err(BillingError::Validation("a budget needs at least one item".into()));
        }
        if let Some(item) = items.iter().find(|i| !i.price.is_finite() || i.price < 0.0) {
            return Err(BillingError::Validation(format!(
                "item {} has invalid price {}",
                item.name, item.price
            )));
        }

        let store = self.db.records();
        patient_balance(&store, patient_id)?;

        let budget = Budget::new(patient_id.to_string(), items);
        store.insert_budget(&budget)?;
        info!(budget = %budget.id, patient = patient_id, total = budget.total, "created budget");
        Ok(budget)
    }

    /// Create a budget from the planned treatments on an odontogram.
    pub fn create_budget_from_odontogram(
        &self,
        patient_id: &str,
        odontogram: &OdontogramSelection,
    ) -> BillingResult<Budget> {
        self.create_budget(patient_id, odontogram.planned_budget_items())
    }

    /// Attach or replace the payment plan of a pending budget.
    pub fn set_plan(
        &self,
        budget_id: &str,
        plan_type: PlanType,
        duration: i32,
        interest_rate: f64,
        start_date: Option<NaiveDate>,
    ) -> BillingResult<Budget> {
        let store = self.db.records();
        let mut budget = load_budget(&store, budget_id)?;
        if budget.status != BudgetStatus::Pending {
            return Err(BillingError::Validation(format!(
                "plan can only change while pending, budget is {}",
                budget.status
            )));
        }

        let plan = build_plan(budget.total, plan_type, duration, interest_rate, start_date)?;
        info!(
            budget = budget_id,
            plan = ?plan.plan_type,
            installments = plan.breakdown.installment_count,
            final_total = plan.breakdown.final_total,
            "set payment plan"
        );
        budget.plan = Some(plan);
        budget.touch();
        store.update_budget(&budget)?;
        Ok(budget)
    }

    /// Accept a pending budget. The patient owes its amount due.
    pub fn accept_budget(&self, budget_id: &str) -> BillingResult<BudgetTransition> {
        let tx = self.db.begin()?;
        let store = Records::new(&tx);

        let mut budget = load_budget(&store, budget_id)?;
        if budget.status != BudgetStatus::Pending {
            return Err(BillingError::InvalidTransition {
                from: budget.status,
                to: BudgetStatus::Accepted,
            });
        }

        budget.status = BudgetStatus::Accepted;
        budget.touch();
        store.update_budget(&budget)?;

        let delta = budget.amount_due();
        let balance = apply_balance(&store, &budget, LedgerEntryKind::BudgetAccepted, delta)?;
        tx.commit()?;

        info!(budget = budget_id, patient = %budget.patient, delta, balance, "accepted budget");
        Ok(BudgetTransition {
            budget,
            balance_delta: delta,
            patient_balance: balance,
        })
    }

    /// Reject a pending or accepted budget. Rejecting an accepted budget
    /// reverses the amount charged on acceptance.
    pub fn reject_budget(&self, budget_id: &str) -> BillingResult<BudgetTransition> {
        let tx = self.db.begin()?;
        let store = Records::new(&tx);

        let mut budget = load_budget(&store, budget_id)?;
        let was_accepted = match budget.status {
            BudgetStatus::Pending => false,
            BudgetStatus::Accepted => true,
            from => {
                return Err(BillingError::InvalidTransition {
                    from,
                    to: BudgetStatus::Rejected,
                })
            }
        };

        budget.status = BudgetStatus::Rejected;
        budget.touch();
        store.update_budget(&budget)?;

        let (delta, balance) = if was_accepted {
            let delta = -budget.amount_due();
            let balance = apply_balance(&store, &budget, LedgerEntryKind::BudgetRejected, delta)?;
            (delta, balance)
        } else {
            (0.0, patient_balance(&store, &budget.patient)?)
        };
        tx.commit()?;

        info!(budget = budget_id, patient = %budget.patient, delta, balance, "rejected budget");
        Ok(BudgetTransition {
            budget,
            balance_delta: delta,
            patient_balance: balance,
        })
    }

    /// Register a payment against an accepted or partially paid budget.
    ///
    /// The budget becomes `paid` once payments cover the amount due,
    /// otherwise `partial`.
    pub fn register_payment(
        &self,
        budget_id: &str,
        amount: f64,
        method: PaymentMethod,
        date: Option<String>,
    ) -> BillingResult<BudgetTransition> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(BillingError::Validation(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }

        let tx = self.db.begin()?;
        let store = Records::new(&tx);

        let mut budget = load_budget(&store, budget_id)?;
        if !matches!(budget.status, BudgetStatus::Accepted | BudgetStatus::Partial) {
            return Err(BillingError::InvalidTransition {
                from: budget.status,
                to: BudgetStatus::Partial,
            });
        }
        if amount > budget.outstanding() + BALANCE_TOLERANCE {
            warn!(
                budget = budget_id,
                amount,
                outstanding = budget.outstanding(),
                "payment exceeds outstanding amount"
            );
        }

        budget.payments.push(Payment {
            amount,
            date: date.unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            method,
        });
        budget.status = if budget.paid_total() + BALANCE_TOLERANCE >= budget.amount_due() {
            BudgetStatus::Paid
        } else {
            BudgetStatus::Partial
        };
        budget.touch();
        store.update_budget(&budget)?;

        let delta = -amount;
        let balance = apply_balance(&store, &budget, LedgerEntryKind::Payment, delta)?;
        tx.commit()?;

        info!(
            budget = budget_id,
            patient = %budget.patient,
            amount,
            status = %budget.status,
            balance,
            "registered payment"
        );
        Ok(BudgetTransition {
            budget,
            balance_delta: delta,
            patient_balance: balance,
        })
    }

    /// Compare the patient's balance with the ledger and restore the ledger
    /// value when they drifted apart.
    ///
    /// A broken chain is reported but never compensated.
    pub fn reconcile_balance(&self, patient_id: &str) -> BillingResult<LedgerReport> {
        let tx = self.db.begin()?;
        let store = Records::new(&tx);
        let ledger = BalanceLedger::new(&store);

        let recorded = patient_balance(&store, patient_id)?;
        let first_broken_seq = ledger.first_broken(patient_id)?;
        let ledger_balance = ledger
            .last_entry(patient_id)?
            .map(|entry| entry.balance_after)
            .unwrap_or(recorded);
        let drift = recorded - ledger_balance;

        let mut report = LedgerReport {
            patient: patient_id.to_string(),
            recorded_balance: recorded,
            ledger_balance,
            drift,
            first_broken_seq,
            compensation: None,
        };

        if let Some(seq) = first_broken_seq {
            warn!(patient = patient_id, seq, "balance ledger chain is broken");
            return Ok(report);
        }
        if drift.abs() <= BALANCE_TOLERANCE {
            return Ok(report);
        }

        warn!(patient = patient_id, recorded, ledger_balance, drift, "balance drifted from ledger");
        store.set_balance(patient_id, ledger_balance)?;
        let entry = ledger.append(BalanceChange {
            patient: patient_id,
            budget: None,
            kind: LedgerEntryKind::Reconciliation,
            balance_before: recorded,
            balance_after: ledger_balance,
        })?;
        tx.commit()?;

        report.compensation = Some(entry);
        Ok(report)
    }
}
