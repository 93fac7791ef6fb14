//! Portfolio-level KPI aggregation.
//!
//! Covers:
//! 1. **Outstanding total** -- sum over the active book.
//! 2. **Weighted averages** -- APR and remaining tenor, balance-weighted.
//! 3. **Tenor mix** -- fixed half-open buckets over tenor days.
//! 4. **Concentration** -- per-customer exposure ranking, HHI, risk label.
//! 5. **NPL** -- count- or balance-based ratio, basis stated in output.
//! 6. **DPD summary** -- per-bucket rollup with contract field names.
//!
//! Every reduction here is associative and commutative: grouping goes
//! through `BTreeMap` and ranking ties break on customer id, so a
//! re-ordered but otherwise identical input produces bit-identical output.
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::buckets::BucketPolicy;
use crate::delinquency::DpdResult;
use crate::error::LendingRiskError;
use crate::types::{Days, LoanRecord, Money, Rate};
use crate::LendingRiskResult;

/// Months-equivalent tenor buckets use whole 30-day months.
pub const DAYS_PER_MONTH: Days = 30;

/// How many top customer exposures to surface by default.
pub const DEFAULT_TOP_EXPOSURES: usize = 10;

/// Matched pricing fields for one loan. Absent when the grid lookup
/// failed; the failure itself is flagged in report metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanPricing {
    pub segment: String,
    pub base_rate: Rate,
    pub margin: Rate,
    pub total_rate: Rate,
    /// Loan APR minus grid total rate. Positive = priced above grid.
    pub rate_variance: Rate,
}

/// One loan enriched with its derived delinquency state and pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedLoan {
    pub loan: LoanRecord,
    pub dpd: DpdResult,
    pub pricing: Option<LoanPricing>,
}

/// One months-equivalent tenor bucket, half-open in days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenorBucketDef {
    /// Label, e.g. "13-24m".
    pub label: String,
    /// Lower bound in days, inclusive.
    pub lower_days: Days,
    /// Upper bound in days, exclusive. `None` marks the open-ended tail.
    pub upper_days: Option<Days>,
}

/// Ordered tenor-mix partition. Same interval conventions as the DPD
/// bucket table: sorted, gap-free from zero, one open-ended tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenorMixPolicy {
    pub buckets: Vec<TenorBucketDef>,
}

impl Default for TenorMixPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl TenorMixPolicy {
    /// Standard partition: 0-12, 13-24, 25-36, 37+ months-equivalent.
    pub fn standard() -> Self {
        let month = DAYS_PER_MONTH;
        TenorMixPolicy {
            buckets: vec![
                TenorBucketDef {
                    label: "0-12m".into(),
                    lower_days: 0,
                    upper_days: Some(12 * month),
                },
                TenorBucketDef {
                    label: "13-24m".into(),
                    lower_days: 12 * month,
                    upper_days: Some(24 * month),
                },
                TenorBucketDef {
                    label: "25-36m".into(),
                    lower_days: 24 * month,
                    upper_days: Some(36 * month),
                },
                TenorBucketDef {
                    label: "37m+".into(),
                    lower_days: 36 * month,
                    upper_days: None,
                },
            ],
        }
    }

    pub fn validate(&self) -> LendingRiskResult<()> {
        if self.buckets.is_empty() {
            return Err(LendingRiskError::Configuration(
                "Tenor mix policy must contain at least one bucket.".into(),
            ));
        }
        if self.buckets[0].lower_days != 0 {
            return Err(LendingRiskError::Configuration(format!(
                "First tenor bucket '{}' must start at 0 days.",
                self.buckets[0].label
            )));
        }
        for (i, bucket) in self.buckets.iter().enumerate() {
            let is_last = i + 1 == self.buckets.len();
            match bucket.upper_days {
                None if !is_last => {
                    return Err(LendingRiskError::Configuration(format!(
                        "Tenor bucket '{}' is open-ended but not last.",
                        bucket.label
                    )));
                }
                Some(upper) if upper <= bucket.lower_days => {
                    return Err(LendingRiskError::Configuration(format!(
                        "Tenor bucket '{}' has empty interval [{}, {}).",
                        bucket.label, bucket.lower_days, upper
                    )));
                }
                Some(upper) if is_last => {
                    return Err(LendingRiskError::Configuration(format!(
                        "Last tenor bucket '{}' must be open-ended, has upper bound {}.",
                        bucket.label, upper
                    )));
                }
                _ => {}
            }
            if !is_last {
                let upper = bucket.upper_days.unwrap_or(bucket.lower_days);
                if self.buckets[i + 1].lower_days != upper {
                    return Err(LendingRiskError::Configuration(format!(
                        "Tenor buckets '{}' and '{}' are not contiguous.",
                        bucket.label,
                        self.buckets[i + 1].label
                    )));
                }
            }
        }
        Ok(())
    }

    /// Half-open lookup; tenor equal to an upper bound falls into the
    /// next bucket.
    pub fn bucket_for(&self, tenor_days: Decimal) -> LendingRiskResult<&TenorBucketDef> {
        self.buckets
            .iter()
            .find(|b| {
                tenor_days >= Decimal::from(b.lower_days)
                    && b.upper_days.map_or(true, |u| tenor_days < Decimal::from(u))
            })
            .ok_or_else(|| {
                LendingRiskError::Configuration(format!(
                    "No tenor bucket covers {tenor_days} days; tenor table has a gap."
                ))
            })
    }
}

/// Whether the NPL ratio divides loan counts or outstanding balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NplBasis {
    #[default]
    Count,
    Balance,
}

/// Aggregation knobs: tenor partition, NPL basis, exposure ranking depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationPolicy {
    #[serde(default)]
    pub tenor_mix: TenorMixPolicy,
    #[serde(default)]
    pub npl_basis: NplBasis,
    #[serde(default = "default_top_exposures")]
    pub top_exposures: usize,
}

fn default_top_exposures() -> usize {
    DEFAULT_TOP_EXPOSURES
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        AggregationPolicy {
            tenor_mix: TenorMixPolicy::standard(),
            npl_basis: NplBasis::Count,
            top_exposures: DEFAULT_TOP_EXPOSURES,
        }
    }
}

impl AggregationPolicy {
    pub fn validate(&self) -> LendingRiskResult<()> {
        if self.top_exposures == 0 {
            return Err(LendingRiskError::Configuration(
                "top_exposures must be at least 1.".into(),
            ));
        }
        self.tenor_mix.validate()
    }
}

/// One tenor-mix row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenorMixBucket {
    pub label: String,
    pub count: u64,
    pub balance: Money,
    pub balance_share: Rate,
}

/// One customer's exposure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerExposure {
    pub customer_id: String,
    pub loan_count: u64,
    pub balance: Money,
    /// Share of portfolio outstanding total, 0-1.
    pub share: Rate,
}

/// Non-performing-loan summary. The basis is part of the output so
/// consumers never have to guess how the ratio was computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NplSummary {
    pub basis: NplBasis,
    pub npl_count: u64,
    pub npl_balance: Money,
    pub npl_ratio: Rate,
}

/// One row of the DPD bucket rollup. Field names are a stability
/// contract with downstream exporters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DpdSummaryRow {
    pub dpd_bucket: String,
    pub dpd_bucket_value: u8,
    pub dpd_bucket_description: String,
    pub default_flag: bool,
    pub loan_count: u64,
    pub past_due_amount: Money,
    pub balance: Money,
    pub balance_share: Rate,
}

/// Portfolio-level scalar KPIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioKpis {
    pub outstanding_total: Money,
    pub weighted_apr: Rate,
    pub weighted_avg_tenor_days: Decimal,
    /// Balance-weighted APR-vs-grid spread over priced loans; None when no
    /// loan matched a band.
    pub avg_rate_variance: Option<Rate>,
    pub tenor_mix: Vec<TenorMixBucket>,
    pub concentration: Vec<CustomerExposure>,
    pub top_exposures: Vec<CustomerExposure>,
    pub concentration_hhi: Decimal,
    /// "Low" / "Moderate" / "High" from the HHI.
    pub concentration_risk: String,
    pub npl: NplSummary,
    pub dpd_summary: Vec<DpdSummaryRow>,
}

/// Aggregate enriched loans into portfolio KPIs.
///
/// Retired loans (zero outstanding balance) are excluded from every
/// aggregate here; they still appear in the per-loan report rows. An
/// empty or fully-repaid portfolio yields zero ratios, never a
/// division by zero.
pub fn aggregate(
    loans: &[EnrichedLoan],
    buckets: &BucketPolicy,
    policy: &AggregationPolicy,
) -> LendingRiskResult<PortfolioKpis> {
    policy.validate()?;

    let active: Vec<&EnrichedLoan> = loans.iter().filter(|l| l.loan.is_active()).collect();

    let outstanding_total: Money = active.iter().map(|l| l.loan.outstanding_balance).sum();

    let weighted_apr = weighted_average(
        &active,
        outstanding_total,
        |l| l.loan.apr,
    );
    let weighted_avg_tenor_days = weighted_average(
        &active,
        outstanding_total,
        |l| l.loan.tenor_days,
    );

    // Rate variance only over loans that matched a band.
    let priced: Vec<&&EnrichedLoan> = active.iter().filter(|l| l.pricing.is_some()).collect();
    let priced_balance: Money = priced.iter().map(|l| l.loan.outstanding_balance).sum();
    let avg_rate_variance = if priced_balance > Decimal::ZERO {
        let weighted: Decimal = priced
            .iter()
            .filter_map(|l| {
                l.pricing
                    .as_ref()
                    .map(|p| l.loan.outstanding_balance * p.rate_variance)
            })
            .sum();
        Some(weighted / priced_balance)
    } else {
        None
    };

    let tenor_mix = build_tenor_mix(&active, outstanding_total, &policy.tenor_mix)?;

    let concentration = build_concentration(&active, outstanding_total);
    let top_exposures: Vec<CustomerExposure> = concentration
        .iter()
        .take(policy.top_exposures)
        .cloned()
        .collect();
    let concentration_hhi = calculate_hhi(&concentration);
    let concentration_risk = classify_hhi(concentration_hhi);

    let npl = build_npl(&active, outstanding_total, policy.npl_basis);

    let dpd_summary = build_dpd_summary(&active, outstanding_total, buckets);

    Ok(PortfolioKpis {
        outstanding_total,
        weighted_apr,
        weighted_avg_tenor_days,
        avg_rate_variance,
        tenor_mix,
        concentration,
        top_exposures,
        concentration_hhi,
        concentration_risk,
        npl,
        dpd_summary,
    })
}

/// Balance-weighted mean, exactly 0 when the book is empty.
fn weighted_average<F>(active: &[&EnrichedLoan], total: Money, value: F) -> Decimal
where
    F: Fn(&EnrichedLoan) -> Decimal,
{
    if total == Decimal::ZERO {
        return Decimal::ZERO;
    }
    let weighted: Decimal = active
        .iter()
        .map(|l| l.loan.outstanding_balance * value(l))
        .sum();
    weighted / total
}

fn build_tenor_mix(
    active: &[&EnrichedLoan],
    total: Money,
    policy: &TenorMixPolicy,
) -> LendingRiskResult<Vec<TenorMixBucket>> {
    let mut map: BTreeMap<String, (u64, Money)> = BTreeMap::new();
    for bucket in &policy.buckets {
        map.insert(bucket.label.clone(), (0, Decimal::ZERO));
    }
    for l in active {
        let bucket = policy.bucket_for(l.loan.tenor_days)?;
        let entry = map.entry(bucket.label.clone()).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += l.loan.outstanding_balance;
    }
    Ok(policy
        .buckets
        .iter()
        .map(|bucket| {
            let (count, balance) = map.get(&bucket.label).copied().unwrap_or((0, Decimal::ZERO));
            TenorMixBucket {
                label: bucket.label.clone(),
                count,
                balance,
                balance_share: share_of(balance, total),
            }
        })
        .collect())
}

fn build_concentration(active: &[&EnrichedLoan], total: Money) -> Vec<CustomerExposure> {
    let mut map: BTreeMap<String, (Money, u64)> = BTreeMap::new();
    for l in active {
        let entry = map
            .entry(l.loan.customer_id.clone())
            .or_insert((Decimal::ZERO, 0));
        entry.0 += l.loan.outstanding_balance;
        entry.1 += 1;
    }
    let mut items: Vec<CustomerExposure> = map
        .into_iter()
        .map(|(customer_id, (balance, loan_count))| CustomerExposure {
            customer_id,
            loan_count,
            balance,
            share: share_of(balance, total),
        })
        .collect();
    // Rank descending; ties break on customer id so output is
    // independent of input order.
    items.sort_by(|a, b| {
        b.balance
            .cmp(&a.balance)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    items
}

fn calculate_hhi(items: &[CustomerExposure]) -> Decimal {
    // HHI = sum of squared shares in percentage points.
    items
        .iter()
        .map(|item| {
            let share_pct = item.share * dec!(100);
            share_pct * share_pct
        })
        .sum()
}

fn classify_hhi(hhi: Decimal) -> String {
    if hhi < dec!(1500) {
        "Low".to_string()
    } else if hhi < dec!(2500) {
        "Moderate".to_string()
    } else {
        "High".to_string()
    }
}

fn build_npl(active: &[&EnrichedLoan], total: Money, basis: NplBasis) -> NplSummary {
    let npl: Vec<&&EnrichedLoan> = active.iter().filter(|l| l.dpd.is_default).collect();
    let npl_count = npl.len() as u64;
    let npl_balance: Money = npl.iter().map(|l| l.loan.outstanding_balance).sum();
    let npl_ratio = match basis {
        NplBasis::Count => {
            if active.is_empty() {
                Decimal::ZERO
            } else {
                Decimal::from(npl_count) / Decimal::from(active.len() as u64)
            }
        }
        NplBasis::Balance => share_of(npl_balance, total),
    };
    NplSummary {
        basis,
        npl_count,
        npl_balance,
        npl_ratio,
    }
}

fn build_dpd_summary(
    active: &[&EnrichedLoan],
    total: Money,
    buckets: &BucketPolicy,
) -> Vec<DpdSummaryRow> {
    let mut map: BTreeMap<u8, (u64, Money, Money)> = BTreeMap::new();
    for l in active {
        let entry = map
            .entry(l.dpd.bucket_value)
            .or_insert((0, Decimal::ZERO, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += l.dpd.past_due_amount;
        entry.2 += l.loan.outstanding_balance;
    }
    buckets
        .buckets
        .iter()
        .map(|bucket| {
            let (loan_count, past_due_amount, balance) = map
                .get(&bucket.value)
                .copied()
                .unwrap_or((0, Decimal::ZERO, Decimal::ZERO));
            DpdSummaryRow {
                dpd_bucket: bucket.label.clone(),
                dpd_bucket_value: bucket.value,
                dpd_bucket_description: bucket.description.clone(),
                default_flag: bucket.is_default,
                loan_count,
                past_due_amount,
                balance,
                balance_share: share_of(balance, total),
            }
        })
        .collect()
}

fn share_of(balance: Money, total: Money) -> Rate {
    if total > Decimal::ZERO {
        balance / total
    } else {
        Decimal::ZERO
    }
}
