//! Pricing grid lookup.
//!
//! Covers:
//! 1. **PricingBand** -- one grid row keyed by tenor and amount ranges.
//! 2. **Grid validation** -- overlap detection per product/segment partition.
//! 3. **Band matching** -- two-dimensional half-open interval lookup.
//! 4. **Rate variance** -- loan APR versus the matched band's total rate.
//!
//! Both dimensions use the `[min, max)` convention: a loan whose tenor
//! equals a band's upper bound belongs to the next band. Zero matches and
//! multiple matches are distinct, surfaced errors; the matcher never
//! resolves ambiguity by picking the first band.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LendingRiskError;
use crate::types::{Money, Rate};
use crate::LendingRiskResult;

/// One row of the pricing grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingBand {
    pub product_type: String,
    pub segment: String,
    /// Tenor range in days, half-open `[tenor_min, tenor_max)`.
    pub tenor_min: Decimal,
    pub tenor_max: Decimal,
    /// Amount range, half-open `[amount_min, amount_max)`.
    pub amount_min: Money,
    pub amount_max: Money,
    pub base_rate: Rate,
    pub margin: Rate,
    /// Must equal `base_rate + margin`; checked at validation.
    pub total_rate: Rate,
}

impl PricingBand {
    /// Half-open containment in both dimensions.
    pub fn contains(&self, tenor_days: Decimal, amount: Money) -> bool {
        tenor_days >= self.tenor_min
            && tenor_days < self.tenor_max
            && amount >= self.amount_min
            && amount < self.amount_max
    }

    fn overlaps(&self, other: &PricingBand) -> bool {
        self.tenor_min < other.tenor_max
            && other.tenor_min < self.tenor_max
            && self.amount_min < other.amount_max
            && other.amount_min < self.amount_max
    }
}

/// The full pricing grid. Overlap within one product/segment partition is a
/// configuration error caught by `validate`, never repaired at lookup time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingGrid {
    pub bands: Vec<PricingBand>,
}

impl PricingGrid {
    pub fn new(bands: Vec<PricingBand>) -> Self {
        PricingGrid { bands }
    }

    /// Check every band has well-formed intervals, a consistent total rate,
    /// and that no two bands in the same product/segment partition overlap.
    pub fn validate(&self) -> LendingRiskResult<()> {
        for band in &self.bands {
            if band.tenor_min < Decimal::ZERO || band.amount_min < Decimal::ZERO {
                return Err(LendingRiskError::Configuration(format!(
                    "Band '{}/{}' has negative interval bounds.",
                    band.product_type, band.segment
                )));
            }
            if band.tenor_min >= band.tenor_max {
                return Err(LendingRiskError::Configuration(format!(
                    "Band '{}/{}' has empty tenor interval [{}, {}).",
                    band.product_type, band.segment, band.tenor_min, band.tenor_max
                )));
            }
            if band.amount_min >= band.amount_max {
                return Err(LendingRiskError::Configuration(format!(
                    "Band '{}/{}' has empty amount interval [{}, {}).",
                    band.product_type, band.segment, band.amount_min, band.amount_max
                )));
            }
            if band.total_rate != band.base_rate + band.margin {
                return Err(LendingRiskError::Configuration(format!(
                    "Band '{}/{}' total rate {} does not equal base {} + margin {}.",
                    band.product_type, band.segment, band.total_rate, band.base_rate, band.margin
                )));
            }
        }
        for (i, a) in self.bands.iter().enumerate() {
            for b in &self.bands[i + 1..] {
                if a.product_type == b.product_type && a.segment == b.segment && a.overlaps(b) {
                    return Err(LendingRiskError::Configuration(format!(
                        "Overlapping bands in partition '{}/{}': tenor [{}, {}) x amount [{}, {}) intersects tenor [{}, {}) x amount [{}, {}).",
                        a.product_type,
                        a.segment,
                        a.tenor_min,
                        a.tenor_max,
                        a.amount_min,
                        a.amount_max,
                        b.tenor_min,
                        b.tenor_max,
                        b.amount_min,
                        b.amount_max
                    )));
                }
            }
        }
        Ok(())
    }

    /// Find the unique band covering (tenor, amount) for a product type.
    ///
    /// Zero matches means the loan sits outside the configured grid and is
    /// reported, not silently defaulted. Multiple matches means the grid
    /// intervals overlap and must be surfaced, never resolved first-match.
    pub fn match_band(
        &self,
        tenor_days: Decimal,
        amount: Money,
        product_type: &str,
    ) -> LendingRiskResult<&PricingBand> {
        let matches: Vec<&PricingBand> = self
            .bands
            .iter()
            .filter(|b| b.product_type == product_type && b.contains(tenor_days, amount))
            .collect();
        match matches.len() {
            0 => Err(LendingRiskError::NoMatchingBand {
                product_type: product_type.to_string(),
                tenor_days,
                amount,
            }),
            1 => Ok(matches[0]),
            n => Err(LendingRiskError::AmbiguousBand {
                product_type: product_type.to_string(),
                tenor_days,
                amount,
                matches: n,
            }),
        }
    }
}

/// Spread between a loan's contractual APR and its band's grid rate.
/// Positive means the loan is priced above the grid.
pub fn rate_variance(apr: Rate, band: &PricingBand) -> Rate {
    apr - band.total_rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn band(
        product: &str,
        segment: &str,
        tenor: (Decimal, Decimal),
        amount: (Decimal, Decimal),
        base: Decimal,
        margin: Decimal,
    ) -> PricingBand {
        PricingBand {
            product_type: product.into(),
            segment: segment.into(),
            tenor_min: tenor.0,
            tenor_max: tenor.1,
            amount_min: amount.0,
            amount_max: amount.1,
            base_rate: base,
            margin,
            total_rate: base + margin,
        }
    }

    fn two_band_grid() -> PricingGrid {
        PricingGrid::new(vec![
            band(
                "term_loan",
                "sme",
                (dec!(0), dec!(90)),
                (dec!(0), dec!(1_000_000)),
                dec!(0.05),
                dec!(0.02),
            ),
            band(
                "term_loan",
                "sme",
                (dec!(90), dec!(180)),
                (dec!(0), dec!(1_000_000)),
                dec!(0.05),
                dec!(0.03),
            ),
        ])
    }

    #[test]
    fn test_valid_grid_passes() {
        assert!(two_band_grid().validate().is_ok());
    }

    #[test]
    fn test_tenor_on_boundary_matches_next_band() {
        // Tenor 90 with bands [0,90) and [90,180) must match the second.
        let grid = two_band_grid();
        let matched = grid.match_band(dec!(90), dec!(500_000), "term_loan").unwrap();
        assert_eq!(matched.tenor_min, dec!(90));
        assert_eq!(matched.total_rate, dec!(0.08));
    }

    #[test]
    fn test_tenor_below_boundary_matches_short_band() {
        let grid = two_band_grid();
        let matched = grid.match_band(dec!(89), dec!(500_000), "term_loan").unwrap();
        assert_eq!(matched.tenor_min, dec!(0));
    }

    #[test]
    fn test_amount_boundary_is_half_open() {
        let grid = PricingGrid::new(vec![
            band(
                "term_loan",
                "sme",
                (dec!(0), dec!(360)),
                (dec!(0), dec!(100_000)),
                dec!(0.05),
                dec!(0.02),
            ),
            band(
                "term_loan",
                "sme",
                (dec!(0), dec!(360)),
                (dec!(100_000), dec!(500_000)),
                dec!(0.05),
                dec!(0.01),
            ),
        ]);
        let matched = grid.match_band(dec!(180), dec!(100_000), "term_loan").unwrap();
        assert_eq!(matched.amount_min, dec!(100_000));
    }

    #[test]
    fn test_no_match_outside_grid() {
        let grid = two_band_grid();
        let err = grid.match_band(dec!(400), dec!(500_000), "term_loan");
        assert!(matches!(err, Err(LendingRiskError::NoMatchingBand { .. })));
    }

    #[test]
    fn test_no_match_for_unknown_product() {
        let grid = two_band_grid();
        let err = grid.match_band(dec!(30), dec!(500_000), "revolver");
        assert!(matches!(err, Err(LendingRiskError::NoMatchingBand { .. })));
    }

    #[test]
    fn test_overlapping_bands_are_ambiguous_at_lookup() {
        let mut grid = two_band_grid();
        grid.bands[1].tenor_min = dec!(60); // overlaps [0,90)
        let err = grid.match_band(dec!(75), dec!(500_000), "term_loan");
        assert!(matches!(
            err,
            Err(LendingRiskError::AmbiguousBand { matches: 2, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let mut grid = two_band_grid();
        grid.bands[1].tenor_min = dec!(60);
        assert!(grid.validate().is_err());
    }

    #[test]
    fn test_validate_allows_overlap_across_segments() {
        let mut grid = two_band_grid();
        grid.bands[1].tenor_min = dec!(60);
        grid.bands[1].segment = "corporate".into();
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inconsistent_total_rate() {
        let mut grid = two_band_grid();
        grid.bands[0].total_rate = dec!(0.10);
        assert!(grid.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_interval() {
        let mut grid = two_band_grid();
        grid.bands[0].tenor_max = dec!(0);
        assert!(grid.validate().is_err());
    }

    #[test]
    fn test_rate_variance_sign() {
        let grid = two_band_grid();
        let b = grid.match_band(dec!(30), dec!(100), "term_loan").unwrap();
        assert_eq!(rate_variance(dec!(0.09), b), dec!(0.02));
        assert_eq!(rate_variance(dec!(0.05), b), dec!(-0.02));
    }
}
