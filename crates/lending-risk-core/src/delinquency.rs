//! Per-loan delinquency computation.
//!
//! Covers:
//! 1. **Payment allocation** -- oldest-due-first matching of payments to
//!    installments, up to a reference date.
//! 2. **Arrears** -- past-due amount and first arrears date.
//! 3. **DPD** -- whole-day difference, never fractional.
//! 4. **Default flag** -- policy threshold (documented default 180 days;
//!    90 and 120 are the named alternatives).
//! 5. **Bucketing** -- via the aging bucket table.
//!
//! The result is recomputed fresh every run from the loan, its schedule,
//! and its payment history. It is a report artifact, never authoritative
//! state.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::buckets::BucketPolicy;
use crate::error::LendingRiskError;
use crate::types::{Days, LoanRecord, Money, PaymentEvent, PaymentScheduleEntry};
use crate::LendingRiskResult;

/// Documented default: a loan is non-performing at 180 days past due.
pub const DEFAULT_THRESHOLD_DAYS: Days = 180;
/// Named alternative thresholds some credit policies use.
pub const THRESHOLD_DAYS_90: Days = 90;
pub const THRESHOLD_DAYS_120: Days = 120;

/// Delinquency policy: default threshold plus the aging bucket table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DpdPolicy {
    #[serde(default = "default_threshold")]
    pub default_threshold_days: Days,
    #[serde(default)]
    pub buckets: BucketPolicy,
}

fn default_threshold() -> Days {
    DEFAULT_THRESHOLD_DAYS
}

impl Default for DpdPolicy {
    fn default() -> Self {
        DpdPolicy {
            default_threshold_days: DEFAULT_THRESHOLD_DAYS,
            buckets: BucketPolicy::standard(),
        }
    }
}

impl DpdPolicy {
    pub fn validate(&self) -> LendingRiskResult<()> {
        if self.default_threshold_days <= 0 {
            return Err(LendingRiskError::Configuration(format!(
                "Default threshold must be positive, got {} days.",
                self.default_threshold_days
            )));
        }
        self.buckets.validate()
    }
}

/// Derived delinquency state for one loan at one reference date.
///
/// Field names are a stability contract with downstream exporters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DpdResult {
    pub loan_id: String,
    pub reference_date: NaiveDate,
    pub days_past_due: Days,
    pub past_due_amount: Money,
    /// Due date of the oldest installment still uncovered at the
    /// reference date. None when the loan is fully current.
    pub first_arrears_date: Option<NaiveDate>,
    /// Most recent payment on or before the reference date.
    pub last_payment_date: Option<NaiveDate>,
    /// Most recent installment due on or before the reference date.
    pub last_due_date: Option<NaiveDate>,
    pub is_default: bool,
    pub bucket: String,
    pub bucket_value: u8,
    pub bucket_description: String,
}

/// Compute days past due for one loan.
///
/// Payments are allocated to installments in chronological order,
/// oldest due first. Only rows dated on or before `reference_date`
/// participate. Malformed rows fail fast with a `DataIntegrity` error
/// naming the loan; the engine never guesses or silently drops bad rows.
pub fn compute_dpd(
    loan: &LoanRecord,
    schedule: &[PaymentScheduleEntry],
    payments: &[PaymentEvent],
    reference_date: NaiveDate,
    policy: &DpdPolicy,
) -> LendingRiskResult<DpdResult> {
    validate_rows(loan, schedule, payments)?;

    let mut due: Vec<&PaymentScheduleEntry> = schedule
        .iter()
        .filter(|e| e.due_date <= reference_date)
        .collect();
    due.sort_by_key(|e| e.due_date);

    let last_due_date = due.last().map(|e| e.due_date);
    let last_payment_date = payments
        .iter()
        .filter(|p| p.payment_date <= reference_date)
        .map(|p| p.payment_date)
        .max();

    // A fully repaid loan is retired: reported current, excluded from
    // delinquency aggregates by the caller.
    let (past_due_amount, first_arrears_date) = if loan.is_active() {
        allocate_oldest_first(&due, payments, reference_date)
    } else {
        (Decimal::ZERO, None)
    };

    let days_past_due = first_arrears_date
        .map(|d| reference_date.signed_duration_since(d).num_days())
        .unwrap_or(0);

    let bucket = policy.buckets.classify(days_past_due)?;

    Ok(DpdResult {
        loan_id: loan.loan_id.clone(),
        reference_date,
        days_past_due,
        past_due_amount,
        first_arrears_date,
        last_payment_date,
        last_due_date,
        is_default: days_past_due >= policy.default_threshold_days,
        bucket: bucket.label.clone(),
        bucket_value: bucket.value,
        bucket_description: bucket.description.clone(),
    })
}

/// Walk installments oldest-first, consuming the pool of payments made on
/// or before the reference date. Returns the uncovered amount and the due
/// date of the oldest uncovered installment.
fn allocate_oldest_first(
    due: &[&PaymentScheduleEntry],
    payments: &[PaymentEvent],
    reference_date: NaiveDate,
) -> (Money, Option<NaiveDate>) {
    let mut remaining: Money = payments
        .iter()
        .filter(|p| p.payment_date <= reference_date)
        .map(|p| p.amount)
        .sum();

    let mut past_due = Decimal::ZERO;
    let mut first_arrears: Option<NaiveDate> = None;

    for entry in due {
        if remaining >= entry.due_amount {
            remaining -= entry.due_amount;
        } else {
            past_due += entry.due_amount - remaining;
            remaining = Decimal::ZERO;
            if first_arrears.is_none() {
                first_arrears = Some(entry.due_date);
            }
        }
    }

    (past_due, first_arrears)
}

fn validate_rows(
    loan: &LoanRecord,
    schedule: &[PaymentScheduleEntry],
    payments: &[PaymentEvent],
) -> LendingRiskResult<()> {
    for entry in schedule {
        if entry.loan_id != loan.loan_id {
            return Err(LendingRiskError::DataIntegrity {
                record: format!("loan '{}'", loan.loan_id),
                reason: format!("schedule row belongs to loan '{}'", entry.loan_id),
            });
        }
        if entry.due_amount < Decimal::ZERO {
            return Err(LendingRiskError::DataIntegrity {
                record: format!("loan '{}'", loan.loan_id),
                reason: format!("negative due amount {} on {}", entry.due_amount, entry.due_date),
            });
        }
        if entry.due_date < loan.origination_date {
            return Err(LendingRiskError::DataIntegrity {
                record: format!("loan '{}'", loan.loan_id),
                reason: format!(
                    "installment due {} before origination {}",
                    entry.due_date, loan.origination_date
                ),
            });
        }
    }
    for payment in payments {
        if payment.loan_id != loan.loan_id {
            return Err(LendingRiskError::DataIntegrity {
                record: format!("loan '{}'", loan.loan_id),
                reason: format!("payment row belongs to loan '{}'", payment.loan_id),
            });
        }
        if payment.amount < Decimal::ZERO {
            return Err(LendingRiskError::DataIntegrity {
                record: format!("loan '{}'", loan.loan_id),
                reason: format!(
                    "negative payment amount {} on {}",
                    payment.amount, payment.payment_date
                ),
            });
        }
        if payment.payment_date < loan.origination_date {
            return Err(LendingRiskError::DataIntegrity {
                record: format!("loan '{}'", loan.loan_id),
                reason: format!(
                    "payment dated {} before origination {}",
                    payment.payment_date, loan.origination_date
                ),
            });
        }
    }
    Ok(())
}
