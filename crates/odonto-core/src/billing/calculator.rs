//! Payment plan arithmetic.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{BillingError, BillingResult};
use crate::models::{PaymentBreakdown, PaymentPlan, PlanType};

/// Round to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Longest installment plan accepted (ten years of monthly payments).
pub const MAX_INSTALLMENTS: i32 = 120;

fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Compute the breakdown for a subtotal under a plan.
///
/// Lump-sum plans always have one installment and no interest, whatever
/// `duration` and `interest_rate` say. Installment plans need
/// `1 <= duration <= MAX_INSTALLMENTS`.
pub fn calculate_payment(
    subtotal: f64,
    plan_type: PlanType,
    duration: i32,
    interest_rate: f64,
) -> BillingResult<PaymentBreakdown> {
    if !subtotal.is_finite() || subtotal < 0.0 {
        return Err(BillingError::Validation(format!(
            "subtotal must be a non-negative amount, got {}",
            subtotal
        )));
    }

    let (installment_count, interest_rate) = match plan_type {
        PlanType::LumpSum => (1, 0.0),
        _ => {
            if duration < 1 {
                return Err(BillingError::Validation(format!(
                    "installment plans need at least one installment, got {}",
                    duration
                )));
            }
            if duration > MAX_INSTALLMENTS {
                return Err(BillingError::Validation(format!(
                    "installment plans allow at most {} installments, got {}",
                    MAX_INSTALLMENTS, duration
                )));
            }
            if !interest_rate.is_finite() || interest_rate < 0.0 {
                return Err(BillingError::Validation(format!(
                    "interest rate must be a non-negative percentage, got {}",
                    interest_rate
                )));
            }
            (duration as u32, interest_rate)
        }
    };

    let interest_amount = subtotal * interest_rate / 100.0;
    let final_total = subtotal + interest_amount;

    Ok(PaymentBreakdown {
        subtotal,
        interest_rate,
        interest_amount,
        final_total,
        installment_count,
        per_installment: final_total / f64::from(installment_count),
    })
}

/// Build a plan to attach to a budget.
pub fn build_plan(
    subtotal: f64,
    plan_type: PlanType,
    duration: i32,
    interest_rate: f64,
    start_date: Option<NaiveDate>,
) -> BillingResult<PaymentPlan> {
    let breakdown = calculate_payment(subtotal, plan_type, duration, interest_rate)?;
    Ok(PaymentPlan {
        plan_type,
        duration: breakdown.installment_count,
        interest_rate: breakdown.interest_rate,
        breakdown,
        start_date: start_date.map(|d| d.to_string()),
    })
}

/// One dated installment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount: f64,
}

fn due_date(plan_type: PlanType, start: NaiveDate, index: u32) -> BillingResult<NaiveDate> {
    let date = match plan_type {
        PlanType::LumpSum => Some(start),
        PlanType::Weekly => start.checked_add_days(Days::new(7 * u64::from(index))),
        PlanType::Biweekly => start.checked_add_days(Days::new(14 * u64::from(index))),
        PlanType::Monthly => start.checked_add_months(Months::new(index)),
    };
    date.ok_or_else(|| BillingError::Validation(format!("installment {} is out of date range", index + 1)))
}

/// Dated installments starting on `start`.
///
/// Amounts are rounded to cents; the last installment takes the rounding
/// remainder so the schedule sums to the final total.
pub fn payment_schedule(
    breakdown: &PaymentBreakdown,
    plan_type: PlanType,
    start: NaiveDate,
) -> BillingResult<Vec<Installment>> {
    if breakdown.installment_count > MAX_INSTALLMENTS as u32 {
        return Err(BillingError::Validation(format!(
            "installment plans allow at most {} installments, got {}",
            MAX_INSTALLMENTS, breakdown.installment_count
        )));
    }
    let count = breakdown.installment_count.max(1);
    let total_cents = to_cents(breakdown.final_total);
    let regular_cents = to_cents(breakdown.per_installment);

    (0..count)
        .map(|index| {
            let cents = if index + 1 == count {
                total_cents - regular_cents * i64::from(count - 1)
            } else {
                regular_cents
            };
            Ok(Installment {
                number: index + 1,
                due_date: due_date(plan_type, start, index)?,
                amount: cents as f64 / 100.0,
            })
        })
        .collect()
}
