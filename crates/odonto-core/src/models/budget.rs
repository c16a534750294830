//! Budget (treatment quote) models.

use serde::{Deserialize, Serialize};

use super::tooth::ToothNumber;

/// Collection holding budgets.
pub const BUDGETS_COLLECTION: &str = "presupuestos";

/// Budget lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    /// Created, awaiting clinician decision
    Pending,
    /// Approved; amount due added to the patient balance
    Accepted,
    /// Declined; any balance increase reversed
    Rejected,
    /// Some payments registered, amount due not yet covered
    Partial,
    /// Payments cover the amount due
    Paid,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Pending => "pending",
            BudgetStatus::Accepted => "accepted",
            BudgetStatus::Rejected => "rejected",
            BudgetStatus::Partial => "partial",
            BudgetStatus::Paid => "paid",
        }
    }

    /// Whether the amount due currently sits on the patient balance.
    pub fn is_billed(&self) -> bool {
        matches!(
            self,
            BudgetStatus::Accepted | BudgetStatus::Partial | BudgetStatus::Paid
        )
    }
}

impl std::fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line in a budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetItem {
    /// Catalog treatment this line was priced from
    #[serde(default)]
    pub treatment_id: Option<String>,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub code: Option<String>,
    /// Tooth the treatment applies to
    #[serde(default)]
    pub tooth: Option<ToothNumber>,
}

impl BudgetItem {
    pub fn new(name: String, price: f64) -> Self {
        Self {
            treatment_id: None,
            name,
            price,
            code: None,
            tooth: None,
        }
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Other,
}

/// A registered payment against a budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub amount: f64,
    /// RFC 3339 timestamp
    pub date: String,
    pub method: PaymentMethod,
}

/// Payment plan cadence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    LumpSum,
    Weekly,
    Biweekly,
    Monthly,
}

/// Derived amounts of a payment plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PaymentBreakdown {
    pub subtotal: f64,
    /// Interest rate actually applied, in percent
    pub interest_rate: f64,
    pub interest_amount: f64,
    pub final_total: f64,
    pub installment_count: u32,
    pub per_installment: f64,
}

/// Payment plan attached to a budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentPlan {
    pub plan_type: PlanType,
    /// Installment count requested (ignored for lump-sum)
    pub duration: u32,
    /// Interest rate requested, in percent
    pub interest_rate: f64,
    pub breakdown: PaymentBreakdown,
    /// First due date (YYYY-MM-DD)
    #[serde(default)]
    pub start_date: Option<String>,
}

/// A treatment budget for a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: String,
    /// Patient record ID
    pub patient: String,
    pub items: Vec<BudgetItem>,
    /// Sum of item prices
    pub total: f64,
    pub status: BudgetStatus,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub plan: Option<PaymentPlan>,
    pub created_at: String,
    pub updated_at: String,
}

impl Budget {
    /// Create a pending budget with no payments.
    pub fn new(patient: String, items: Vec<BudgetItem>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let total = items.iter().map(|i| i.price).sum();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient,
            items,
            total,
            status: BudgetStatus::Pending,
            payments: Vec::new(),
            plan: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Amount the patient owes once accepted: the plan's final total when a
    /// plan is attached, otherwise the item total.
    pub fn amount_due(&self) -> f64 {
        self.plan
            .as_ref()
            .map(|p| p.breakdown.final_total)
            .unwrap_or(self.total)
    }

    pub fn paid_total(&self) -> f64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn outstanding(&self) -> f64 {
        (self.amount_due() - self.paid_total()).max(0.0)
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
