//! Portfolio report orchestration.
//!
//! The sole entry point external collaborators call: one immutable
//! snapshot of loans, schedule and payments in, one immutable
//! `PortfolioReport` out. The orchestrator never returns a partially
//! silent report: every excluded record and per-loan pricing failure is
//! enumerated in the metadata section, so a consumer can distinguish
//! "zero NPL loans" from "NPL computation failed for all loans".
//!
//! Per-loan delinquency only depends on that loan's own rows, so the
//! per-loan stage runs as a rayon parallel map; every downstream
//! reduction is associative and commutative, so worker completion order
//! cannot change the output.

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::aggregate::{
    aggregate, AggregationPolicy, EnrichedLoan, LoanPricing, PortfolioKpis,
};
use crate::delinquency::{compute_dpd, DpdPolicy};
use crate::error::LendingRiskError;
use crate::lifecycle::{
    track_clients, ClientGoals, ClientState, LifecyclePolicy, ReportingWindow,
};
use crate::pricing::{rate_variance, PricingGrid};
use crate::types::{
    Currency, Days, LoanRecord, Money, PaymentEvent, PaymentFrequency, PaymentScheduleEntry,
    PortfolioSnapshot, Rate,
};
use crate::LendingRiskResult;

/// Everything configurable about one reporting run. Read-only for the
/// duration of the run; a new run re-reads a fresh snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPolicy {
    #[serde(default)]
    pub dpd: DpdPolicy,
    pub pricing: PricingGrid,
    #[serde(default)]
    pub aggregation: AggregationPolicy,
    #[serde(default)]
    pub lifecycle: LifecyclePolicy,
    pub reporting_window: ReportingWindow,
    /// Valid APR range for intake screening, inclusive bounds.
    #[serde(default = "default_apr_min")]
    pub apr_min: Rate,
    #[serde(default = "default_apr_max")]
    pub apr_max: Rate,
}

fn default_apr_min() -> Rate {
    Decimal::ZERO
}

fn default_apr_max() -> Rate {
    Decimal::ONE
}

impl ReportPolicy {
    pub fn new(pricing: PricingGrid, reporting_window: ReportingWindow) -> Self {
        ReportPolicy {
            dpd: DpdPolicy::default(),
            pricing,
            aggregation: AggregationPolicy::default(),
            lifecycle: LifecyclePolicy::default(),
            reporting_window,
            apr_min: default_apr_min(),
            apr_max: default_apr_max(),
        }
    }

    /// Policy problems are fatal for the whole run; they affect every
    /// loan and are never silently repaired.
    pub fn validate(&self) -> LendingRiskResult<()> {
        self.dpd.validate()?;
        self.pricing.validate()?;
        self.aggregation.validate()?;
        self.lifecycle.validate()?;
        self.reporting_window.validate()?;
        if self.apr_min > self.apr_max {
            return Err(LendingRiskError::Configuration(format!(
                "APR range [{}, {}] is empty.",
                self.apr_min, self.apr_max
            )));
        }
        Ok(())
    }
}

/// One per-loan row of the report. The delinquency field names are a
/// stability contract with downstream exporters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanReportRow {
    pub loan_id: String,
    pub customer_id: String,
    pub currency: Currency,
    pub product_type: String,
    pub payment_frequency: PaymentFrequency,
    pub disbursed_amount: Money,
    pub outstanding_balance: Money,
    pub apr: Rate,
    pub tenor_days: Decimal,
    pub origination_date: NaiveDate,
    pub reference_date: NaiveDate,
    pub days_past_due: Days,
    pub past_due_amount: Money,
    pub first_arrears_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
    pub last_due_date: Option<NaiveDate>,
    pub is_default: bool,
    pub bucket: String,
    pub bucket_value: u8,
    pub bucket_description: String,
    /// Grid pricing; unset when the lookup failed (see `pricing_error`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<LoanPricing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_error: Option<String>,
}

/// One excluded input record and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionRecord {
    pub record: String,
    pub reason: String,
}

/// One per-loan pricing-grid lookup failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingFailure {
    pub loan_id: String,
    pub reason: String,
}

/// Run metadata: the report is never partially silent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub engine_version: String,
    pub reference_date: NaiveDate,
    pub npl_basis: crate::aggregate::NplBasis,
    pub loans_total: u64,
    pub loans_included: u64,
    pub schedule_rows_total: u64,
    pub payment_rows_total: u64,
    pub excluded_count: u64,
    pub excluded: Vec<ExclusionRecord>,
    pub pricing_failures: Vec<PricingFailure>,
}

/// The combined output of one reporting run. Immutable; consumed
/// read-only by the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub kpis: PortfolioKpis,
    pub loans: Vec<LoanReportRow>,
    pub clients: Vec<ClientState>,
    pub client_goals: ClientGoals,
    pub metadata: ReportMetadata,
}

/// Compute the full portfolio report for one reference date.
pub fn build_report(
    snapshot: &PortfolioSnapshot,
    reference_date: NaiveDate,
    policy: &ReportPolicy,
) -> LendingRiskResult<PortfolioReport> {
    policy.validate()?;

    let mut excluded: Vec<ExclusionRecord> = Vec::new();

    // Intake screening: malformed loans are excluded and counted, the
    // run continues. A single bad loan must not skew whole-portfolio
    // aggregates or abort the report.
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut included: Vec<&LoanRecord> = Vec::new();
    for loan in &snapshot.loans {
        if !seen_ids.insert(loan.loan_id.as_str()) {
            excluded.push(ExclusionRecord {
                record: format!("loan '{}'", loan.loan_id),
                reason: "duplicate loan_id".into(),
            });
            continue;
        }
        match screen_loan(loan, policy) {
            Ok(()) => included.push(loan),
            Err(reason) => excluded.push(ExclusionRecord {
                record: format!("loan '{}'", loan.loan_id),
                reason,
            }),
        }
    }

    // Partition schedule and payment rows by loan. Rows referencing an
    // unknown loan_id are orphans; rows for a loan that failed screening
    // follow their loan out without a second exclusion entry.
    let included_ids: HashSet<&str> = included.iter().map(|l| l.loan_id.as_str()).collect();
    let mut schedule_by_loan: HashMap<&str, Vec<PaymentScheduleEntry>> = HashMap::new();
    for entry in &snapshot.schedule {
        if included_ids.contains(entry.loan_id.as_str()) {
            schedule_by_loan
                .entry(entry.loan_id.as_str())
                .or_default()
                .push(entry.clone());
        } else if !seen_ids.contains(entry.loan_id.as_str()) {
            excluded.push(ExclusionRecord {
                record: format!("schedule row for loan '{}'", entry.loan_id),
                reason: "orphaned: no such loan in snapshot".into(),
            });
        }
    }
    let mut payments_by_loan: HashMap<&str, Vec<PaymentEvent>> = HashMap::new();
    for payment in &snapshot.payments {
        if included_ids.contains(payment.loan_id.as_str()) {
            payments_by_loan
                .entry(payment.loan_id.as_str())
                .or_default()
                .push(payment.clone());
        } else if !seen_ids.contains(payment.loan_id.as_str()) {
            excluded.push(ExclusionRecord {
                record: format!("payment row for loan '{}'", payment.loan_id),
                reason: "orphaned: no such loan in snapshot".into(),
            });
        }
    }

    // Per-loan stage: DPD and grid pricing, independent per loan.
    let empty_schedule: Vec<PaymentScheduleEntry> = Vec::new();
    let empty_payments: Vec<PaymentEvent> = Vec::new();
    let per_loan: Vec<Result<(EnrichedLoan, Option<String>), ExclusionRecord>> = included
        .par_iter()
        .map(|loan| {
            let schedule = schedule_by_loan
                .get(loan.loan_id.as_str())
                .unwrap_or(&empty_schedule);
            let payments = payments_by_loan
                .get(loan.loan_id.as_str())
                .unwrap_or(&empty_payments);
            let dpd = compute_dpd(loan, schedule, payments, reference_date, &policy.dpd)
                .map_err(|e| ExclusionRecord {
                    record: format!("loan '{}'", loan.loan_id),
                    reason: e.to_string(),
                })?;
            let (pricing, pricing_error) = match policy.pricing.match_band(
                loan.tenor_days,
                loan.disbursed_amount,
                &loan.product_type,
            ) {
                Ok(band) => (
                    Some(LoanPricing {
                        segment: band.segment.clone(),
                        base_rate: band.base_rate,
                        margin: band.margin,
                        total_rate: band.total_rate,
                        rate_variance: rate_variance(loan.apr, band),
                    }),
                    None,
                ),
                Err(e) => (None, Some(e.to_string())),
            };
            Ok((
                EnrichedLoan {
                    loan: (*loan).clone(),
                    dpd,
                    pricing,
                },
                pricing_error,
            ))
        })
        .collect();

    let mut enriched: Vec<EnrichedLoan> = Vec::new();
    let mut rows: Vec<LoanReportRow> = Vec::new();
    let mut pricing_failures: Vec<PricingFailure> = Vec::new();
    for item in per_loan {
        match item {
            Ok((loan, pricing_error)) => {
                if let Some(reason) = &pricing_error {
                    pricing_failures.push(PricingFailure {
                        loan_id: loan.loan.loan_id.clone(),
                        reason: reason.clone(),
                    });
                }
                rows.push(report_row(&loan, pricing_error));
                enriched.push(loan);
            }
            Err(exclusion) => excluded.push(exclusion),
        }
    }

    let kpis = aggregate(&enriched, &policy.dpd.buckets, &policy.aggregation)?;

    let history: Vec<LoanRecord> = enriched.iter().map(|e| e.loan.clone()).collect();
    let (clients, client_goals) =
        track_clients(&history, &policy.reporting_window, &policy.lifecycle)?;

    let metadata = ReportMetadata {
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        reference_date,
        npl_basis: policy.aggregation.npl_basis,
        loans_total: snapshot.loans.len() as u64,
        loans_included: enriched.len() as u64,
        schedule_rows_total: snapshot.schedule.len() as u64,
        payment_rows_total: snapshot.payments.len() as u64,
        excluded_count: excluded.len() as u64,
        excluded,
        pricing_failures,
    };

    Ok(PortfolioReport {
        kpis,
        loans: rows,
        clients,
        client_goals,
        metadata,
    })
}

fn screen_loan(loan: &LoanRecord, policy: &ReportPolicy) -> Result<(), String> {
    if loan.loan_id.is_empty() {
        return Err("empty loan_id".into());
    }
    if loan.disbursed_amount < Decimal::ZERO {
        return Err(format!("negative disbursed amount {}", loan.disbursed_amount));
    }
    if loan.outstanding_balance < Decimal::ZERO {
        return Err(format!(
            "negative outstanding balance {}",
            loan.outstanding_balance
        ));
    }
    if loan.outstanding_balance > loan.disbursed_amount {
        return Err(format!(
            "outstanding balance {} exceeds disbursed amount {}",
            loan.outstanding_balance, loan.disbursed_amount
        ));
    }
    if loan.apr < policy.apr_min || loan.apr > policy.apr_max {
        return Err(format!(
            "apr {} outside valid range [{}, {}]",
            loan.apr, policy.apr_min, policy.apr_max
        ));
    }
    if loan.tenor_days <= Decimal::ZERO {
        return Err(format!("non-positive tenor {} days", loan.tenor_days));
    }
    Ok(())
}

fn report_row(enriched: &EnrichedLoan, pricing_error: Option<String>) -> LoanReportRow {
    let loan = &enriched.loan;
    let dpd = &enriched.dpd;
    LoanReportRow {
        loan_id: loan.loan_id.clone(),
        customer_id: loan.customer_id.clone(),
        currency: loan.currency.clone(),
        product_type: loan.product_type.clone(),
        payment_frequency: loan.payment_frequency,
        disbursed_amount: loan.disbursed_amount,
        outstanding_balance: loan.outstanding_balance,
        apr: loan.apr,
        tenor_days: loan.tenor_days,
        origination_date: loan.origination_date,
        reference_date: dpd.reference_date,
        days_past_due: dpd.days_past_due,
        past_due_amount: dpd.past_due_amount,
        first_arrears_date: dpd.first_arrears_date,
        last_payment_date: dpd.last_payment_date,
        last_due_date: dpd.last_due_date,
        is_default: dpd.is_default,
        bucket: dpd.bucket.clone(),
        bucket_value: dpd.bucket_value,
        bucket_description: dpd.bucket_description.clone(),
        pricing: enriched.pricing.clone(),
        pricing_error,
    }
}
