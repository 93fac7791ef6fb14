use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Whole-day counts (DPD, thresholds). Date arithmetic never produces
/// fractional days.
pub type Days = i64;

/// Currency code
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    GBP,
    #[default]
    USD,
    EUR,
    CHF,
    JPY,
    CAD,
    AUD,
    HKD,
    SGD,
    Other(String),
}

/// Contractual installment cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    Weekly,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    /// Single repayment at maturity.
    Bullet,
}

/// One commercial loan, column-normalized by the ingestion layer.
///
/// The engine reads financial state, it never writes it: balances are
/// mutated upstream, this snapshot is immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRecord {
    pub loan_id: String,
    pub customer_id: String,
    pub currency: Currency,
    /// Key into the pricing grid's product partition.
    pub product_type: String,
    pub disbursed_amount: Money,
    /// Must not exceed `disbursed_amount`. Zero once fully repaid or
    /// written off, which retires the loan from active aggregates.
    pub outstanding_balance: Money,
    /// Annual percentage rate as a 0-1 fraction, never a percentage.
    pub apr: Rate,
    /// Original contractual duration in days.
    pub tenor_days: Decimal,
    pub origination_date: NaiveDate,
    pub payment_frequency: PaymentFrequency,
}

impl LoanRecord {
    /// Contractual maturity date (origination + tenor, whole days).
    pub fn maturity_date(&self) -> NaiveDate {
        let days = self.tenor_days.trunc().to_i64().unwrap_or(0);
        self.origination_date + Duration::days(days)
    }

    /// A loan leaves the active book once fully repaid or written off.
    pub fn is_active(&self) -> bool {
        self.outstanding_balance > Decimal::ZERO
    }
}

/// One expected installment. Immutable once generated at origination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentScheduleEntry {
    pub loan_id: String,
    pub due_date: NaiveDate,
    pub due_amount: Money,
}

/// One actual payment. Append-only; a loan may have zero or many.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub loan_id: String,
    pub payment_date: NaiveDate,
    pub amount: Money,
}

/// Immutable input snapshot for one reporting run: the three
/// column-normalized record sets handed over by the ingestion layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub loans: Vec<LoanRecord>,
    pub schedule: Vec<PaymentScheduleEntry>,
    pub payments: Vec<PaymentEvent>,
}
