use chrono::NaiveDate;
use lending_risk_core::aggregate::{aggregate, AggregationPolicy, EnrichedLoan, NplBasis};
use lending_risk_core::buckets::BucketPolicy;
use lending_risk_core::delinquency::DpdResult;
use lending_risk_core::types::{Currency, LoanRecord, PaymentFrequency};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Aggregator tests — weighted KPIs, concentration, NPL, order independence
// ===========================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn enriched(
    loan_id: &str,
    customer_id: &str,
    balance: Decimal,
    apr: Decimal,
    tenor_days: Decimal,
    days_past_due: i64,
) -> EnrichedLoan {
    let buckets = BucketPolicy::standard();
    let bucket = buckets.classify(days_past_due).unwrap();
    EnrichedLoan {
        loan: LoanRecord {
            loan_id: loan_id.into(),
            customer_id: customer_id.into(),
            currency: Currency::USD,
            product_type: "term_loan".into(),
            disbursed_amount: balance + dec!(10_000),
            outstanding_balance: balance,
            apr,
            tenor_days,
            origination_date: date(2024, 1, 1),
            payment_frequency: PaymentFrequency::Monthly,
        },
        dpd: DpdResult {
            loan_id: loan_id.into(),
            reference_date: date(2025, 6, 30),
            days_past_due,
            past_due_amount: Decimal::ZERO,
            first_arrears_date: None,
            last_payment_date: None,
            last_due_date: None,
            is_default: days_past_due >= 180,
            bucket: bucket.label.clone(),
            bucket_value: bucket.value,
            bucket_description: bucket.description.clone(),
        },
        pricing: None,
    }
}

fn mixed_book() -> Vec<EnrichedLoan> {
    vec![
        enriched("L01", "C-alpha", dec!(1_200_000), dec!(0.072), dec!(360), 0),
        enriched("L02", "C-alpha", dec!(300_000), dec!(0.094), dec!(720), 15),
        enriched("L03", "C-beta", dec!(800_000), dec!(0.065), dec!(1_080), 0),
        enriched("L04", "C-gamma", dec!(450_000), dec!(0.110), dec!(180), 75),
        enriched("L05", "C-delta", dec!(250_000), dec!(0.140), dec!(1_440), 200),
    ]
}

#[test]
fn test_weighted_apr_known_answer() {
    // Balances [100, 200, 300] at APRs [0.10, 0.20, 0.30]:
    // weighted APR = (10 + 40 + 90) / 600 = 0.2333...
    let loans = vec![
        enriched("L1", "C1", dec!(100), dec!(0.10), dec!(360), 0),
        enriched("L2", "C2", dec!(200), dec!(0.20), dec!(360), 0),
        enriched("L3", "C3", dec!(300), dec!(0.30), dec!(360), 0),
    ];
    let kpis = aggregate(&loans, &BucketPolicy::standard(), &AggregationPolicy::default())
        .unwrap();
    assert_eq!(kpis.weighted_apr, dec!(140) / dec!(600));
    let rounded = kpis.weighted_apr.round_dp(4);
    assert_eq!(rounded, dec!(0.2333));
}

#[test]
fn test_weighted_apr_empty_book_is_exactly_zero() {
    let kpis = aggregate(&[], &BucketPolicy::standard(), &AggregationPolicy::default())
        .unwrap();
    assert_eq!(kpis.weighted_apr, Decimal::ZERO);
    assert_eq!(kpis.outstanding_total, Decimal::ZERO);
}

#[test]
fn test_shuffle_invariance_bit_identical() {
    // A re-ordered but otherwise identical input set is a no-op with
    // respect to output.
    let ordered = mixed_book();
    let mut shuffled = mixed_book();
    shuffled.swap(0, 4);
    shuffled.swap(1, 3);
    shuffled.rotate_left(2);

    let a = aggregate(&ordered, &BucketPolicy::standard(), &AggregationPolicy::default())
        .unwrap();
    let b = aggregate(&shuffled, &BucketPolicy::standard(), &AggregationPolicy::default())
        .unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn test_mixed_book_known_answers() {
    let kpis = aggregate(&mixed_book(), &BucketPolicy::standard(), &AggregationPolicy::default())
        .unwrap();
    assert_eq!(kpis.outstanding_total, dec!(3_000_000));

    // (1.2M*.072 + 300k*.094 + 800k*.065 + 450k*.110 + 250k*.140) / 3M
    let weighted = dec!(86_400) + dec!(28_200) + dec!(52_000) + dec!(49_500) + dec!(35_000);
    assert_eq!(kpis.weighted_apr, weighted / dec!(3_000_000));

    // C-alpha holds 1.5M of 3M.
    assert_eq!(kpis.concentration[0].customer_id, "C-alpha");
    assert_eq!(kpis.concentration[0].share, dec!(0.5));
    assert_eq!(kpis.concentration[0].loan_count, 2);

    // One defaulted loan of five, count basis.
    assert_eq!(kpis.npl.npl_count, 1);
    assert_eq!(kpis.npl.npl_ratio, dec!(0.2));
    assert_eq!(kpis.npl.npl_balance, dec!(250_000));
}

#[test]
fn test_npl_basis_is_stated_in_output() {
    let count = aggregate(
        &mixed_book(),
        &BucketPolicy::standard(),
        &AggregationPolicy::default(),
    )
    .unwrap();
    assert_eq!(count.npl.basis, NplBasis::Count);

    let policy = AggregationPolicy {
        npl_basis: NplBasis::Balance,
        ..AggregationPolicy::default()
    };
    let balance = aggregate(&mixed_book(), &BucketPolicy::standard(), &policy).unwrap();
    assert_eq!(balance.npl.basis, NplBasis::Balance);
    // 250k of 3M.
    let expected = dec!(250_000) / dec!(3_000_000);
    assert_eq!(balance.npl.npl_ratio, expected);
}

#[test]
fn test_tenor_mix_known_distribution() {
    let kpis = aggregate(&mixed_book(), &BucketPolicy::standard(), &AggregationPolicy::default())
        .unwrap();
    // 360 -> 13-24m, 720 -> 25-36m, 1080 -> 37m+, 180 -> 0-12m, 1440 -> 37m+.
    let counts: Vec<u64> = kpis.tenor_mix.iter().map(|b| b.count).collect();
    assert_eq!(counts, vec![1, 1, 1, 2]);
    let shares: Decimal = kpis.tenor_mix.iter().map(|b| b.balance_share).sum();
    assert_eq!(shares, Decimal::ONE);
}

#[test]
fn test_dpd_summary_rollup() {
    let kpis = aggregate(&mixed_book(), &BucketPolicy::standard(), &AggregationPolicy::default())
        .unwrap();
    let by_bucket: Vec<(String, u64)> = kpis
        .dpd_summary
        .iter()
        .map(|r| (r.dpd_bucket.clone(), r.loan_count))
        .collect();
    assert_eq!(
        by_bucket,
        vec![
            ("Current".to_string(), 2),
            ("1-30".to_string(), 1),
            ("31-60".to_string(), 0),
            ("61-90".to_string(), 1),
            ("91-120".to_string(), 0),
            ("121-180".to_string(), 0),
            ("180+".to_string(), 1),
        ]
    );
}
