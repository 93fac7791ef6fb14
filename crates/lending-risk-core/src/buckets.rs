//! Delinquency aging buckets.
//!
//! Covers:
//! 1. **Bucket table** -- ordered half-open DPD intervals loaded from policy.
//! 2. **Validation** -- sorted, gap-free, overlap-free, single open-ended tail.
//! 3. **Classification** -- DPD -> bucket lookup.
//!
//! Boundary rule is `[lower, upper)` everywhere: a DPD exactly equal to a
//! bucket's upper bound belongs to the next bucket. DPD 0 always lands in
//! the "Current" bucket.

use serde::{Deserialize, Serialize};

use crate::error::LendingRiskError;
use crate::types::Days;
use crate::LendingRiskResult;

/// One aging bucket: a half-open DPD interval with a label and ordinal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketDef {
    /// Short label, e.g. "31-60".
    pub label: String,
    /// Human-readable description, e.g. "31-60 Days Past Due".
    pub description: String,
    /// Lower bound in days, inclusive.
    pub lower: Days,
    /// Upper bound in days, exclusive. `None` marks the open-ended tail.
    pub upper: Option<Days>,
    /// Ordinal position, exported as `dpd_bucket_value`.
    pub value: u8,
    /// Whether loans in this bucket carry the bucket-level default flag.
    pub is_default: bool,
}

impl BucketDef {
    /// Half-open containment test.
    pub fn contains(&self, days_past_due: Days) -> bool {
        days_past_due >= self.lower && self.upper.map_or(true, |u| days_past_due < u)
    }
}

/// Ordered, non-overlapping bucket table. Validated once at load time;
/// classification itself is a pure lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketPolicy {
    pub buckets: Vec<BucketDef>,
}

impl Default for BucketPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl BucketPolicy {
    /// The documented standard aging table: Current, 1-30, 31-60, 61-90,
    /// 91-120, 121-180, 180+. The 121-180 bucket ends at 180 exclusive so
    /// that DPD 180 lands in 180+, matching a 180-day default threshold.
    pub fn standard() -> Self {
        let defs = [
            ("Current", "Current", 0, Some(1), false),
            ("1-30", "1-30 Days Past Due", 1, Some(31), false),
            ("31-60", "31-60 Days Past Due", 31, Some(61), false),
            ("61-90", "61-90 Days Past Due", 61, Some(91), false),
            ("91-120", "91-120 Days Past Due", 91, Some(121), false),
            ("121-180", "121-180 Days Past Due", 121, Some(180), false),
            ("180+", "Over 180 Days Past Due", 180, None, true),
        ];
        BucketPolicy {
            buckets: defs
                .iter()
                .enumerate()
                .map(|(i, (label, description, lower, upper, is_default))| BucketDef {
                    label: (*label).to_string(),
                    description: (*description).to_string(),
                    lower: *lower,
                    upper: *upper,
                    value: i as u8,
                    is_default: *is_default,
                })
                .collect(),
        }
    }

    /// Check the table is sorted, starts at zero, has no gaps or overlaps,
    /// and ends with exactly one open-ended bucket.
    pub fn validate(&self) -> LendingRiskResult<()> {
        if self.buckets.is_empty() {
            return Err(LendingRiskError::Configuration(
                "Bucket policy must contain at least one bucket.".into(),
            ));
        }
        if self.buckets[0].lower != 0 {
            return Err(LendingRiskError::Configuration(format!(
                "First bucket '{}' must start at 0 days, starts at {}.",
                self.buckets[0].label, self.buckets[0].lower
            )));
        }
        for (i, bucket) in self.buckets.iter().enumerate() {
            let is_last = i + 1 == self.buckets.len();
            match bucket.upper {
                None if !is_last => {
                    return Err(LendingRiskError::Configuration(format!(
                        "Bucket '{}' is open-ended but not last.",
                        bucket.label
                    )));
                }
                Some(upper) if upper <= bucket.lower => {
                    return Err(LendingRiskError::Configuration(format!(
                        "Bucket '{}' has empty interval [{}, {}).",
                        bucket.label, bucket.lower, upper
                    )));
                }
                Some(upper) if is_last => {
                    return Err(LendingRiskError::Configuration(format!(
                        "Last bucket '{}' must be open-ended, has upper bound {}.",
                        bucket.label, upper
                    )));
                }
                _ => {}
            }
            if !is_last {
                let next = &self.buckets[i + 1];
                // upper is Some here: the None-not-last case returned above.
                let upper = bucket.upper.unwrap_or(bucket.lower);
                if next.lower != upper {
                    return Err(LendingRiskError::Configuration(format!(
                        "Buckets '{}' and '{}' are not contiguous: [{}, {}) then lower {}.",
                        bucket.label, next.label, bucket.lower, upper, next.lower
                    )));
                }
                if next.value <= bucket.value {
                    return Err(LendingRiskError::Configuration(format!(
                        "Bucket ordinals must be strictly increasing: '{}' has {}, '{}' has {}.",
                        bucket.label, bucket.value, next.label, next.value
                    )));
                }
            }
        }
        Ok(())
    }

    /// Map a non-negative DPD to its bucket.
    ///
    /// A gap hit means the table was never validated; it is reported as a
    /// configuration error, not repaired.
    pub fn classify(&self, days_past_due: Days) -> LendingRiskResult<&BucketDef> {
        if days_past_due < 0 {
            return Err(LendingRiskError::InvalidInput {
                field: "days_past_due".into(),
                reason: format!("must be non-negative, got {days_past_due}"),
            });
        }
        self.buckets
            .iter()
            .find(|b| b.contains(days_past_due))
            .ok_or_else(|| {
                LendingRiskError::Configuration(format!(
                    "No bucket covers {days_past_due} days past due; bucket table has a gap."
                ))
            })
    }
}
