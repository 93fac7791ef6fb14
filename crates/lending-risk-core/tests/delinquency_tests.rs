use chrono::NaiveDate;
use lending_risk_core::buckets::BucketPolicy;
use lending_risk_core::delinquency::{compute_dpd, DpdPolicy};
use lending_risk_core::types::{
    Currency, LoanRecord, PaymentEvent, PaymentFrequency, PaymentScheduleEntry,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Delinquency Engine tests — allocation, DPD, default flag
// ===========================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn quarterly_loan() -> LoanRecord {
    LoanRecord {
        loan_id: "LN-2031".into(),
        customer_id: "C-77".into(),
        currency: Currency::EUR,
        product_type: "term_loan".into(),
        disbursed_amount: dec!(400_000),
        outstanding_balance: dec!(300_000),
        apr: dec!(0.085),
        tenor_days: dec!(720),
        origination_date: date(2024, 3, 1),
        payment_frequency: PaymentFrequency::Quarterly,
    }
}

fn schedule(entries: &[(NaiveDate, Decimal)]) -> Vec<PaymentScheduleEntry> {
    entries
        .iter()
        .map(|(due_date, due_amount)| PaymentScheduleEntry {
            loan_id: "LN-2031".into(),
            due_date: *due_date,
            due_amount: *due_amount,
        })
        .collect()
}

fn payments(events: &[(NaiveDate, Decimal)]) -> Vec<PaymentEvent> {
    events
        .iter()
        .map(|(payment_date, amount)| PaymentEvent {
            loan_id: "LN-2031".into(),
            payment_date: *payment_date,
            amount: *amount,
        })
        .collect()
}

#[test]
fn test_fully_current_loan_scenario() {
    // Fully current loan => bucket "Current", not default.
    let loan = quarterly_loan();
    let sched = schedule(&[
        (date(2024, 6, 1), dec!(50_000)),
        (date(2024, 9, 1), dec!(50_000)),
    ]);
    let pays = payments(&[
        (date(2024, 6, 1), dec!(50_000)),
        (date(2024, 8, 30), dec!(50_000)),
    ]);
    let result = compute_dpd(&loan, &sched, &pays, date(2024, 10, 1), &DpdPolicy::default())
        .unwrap();
    assert_eq!(result.days_past_due, 0);
    assert_eq!(result.bucket, "Current");
    assert!(!result.is_default);
    assert_eq!(result.past_due_amount, Decimal::ZERO);
    assert_eq!(result.first_arrears_date, None);
}

#[test]
fn test_dpd_180_at_threshold_180_is_default_scenario() {
    // DPD 180 with a 180-day threshold => "180+", default.
    let loan = quarterly_loan();
    let sched = schedule(&[(date(2024, 6, 1), dec!(50_000))]);
    let reference = date(2024, 6, 1) + chrono::Duration::days(180);
    let result = compute_dpd(&loan, &sched, &[], reference, &DpdPolicy::default()).unwrap();
    assert_eq!(result.days_past_due, 180);
    assert_eq!(result.bucket, "180+");
    assert!(result.is_default);
}

#[test]
fn test_arrears_cleared_by_later_payment() {
    // Missed in June, caught up in July: as of August the loan is current.
    let loan = quarterly_loan();
    let sched = schedule(&[(date(2024, 6, 1), dec!(50_000))]);
    let pays = payments(&[(date(2024, 7, 15), dec!(50_000))]);

    let in_arrears =
        compute_dpd(&loan, &sched, &pays, date(2024, 7, 1), &DpdPolicy::default()).unwrap();
    assert_eq!(in_arrears.days_past_due, 30);
    assert_eq!(in_arrears.bucket, "1-30");

    let caught_up =
        compute_dpd(&loan, &sched, &pays, date(2024, 8, 1), &DpdPolicy::default()).unwrap();
    assert_eq!(caught_up.days_past_due, 0);
    assert_eq!(caught_up.bucket, "Current");
}

#[test]
fn test_oldest_first_allocation_across_installments() {
    // One lump payment covers the first installment and part of the
    // second; arrears date stays on the second installment.
    let loan = quarterly_loan();
    let sched = schedule(&[
        (date(2024, 6, 1), dec!(50_000)),
        (date(2024, 9, 1), dec!(50_000)),
        (date(2024, 12, 1), dec!(50_000)),
    ]);
    let pays = payments(&[(date(2024, 6, 10), dec!(70_000))]);
    let result = compute_dpd(&loan, &sched, &pays, date(2024, 12, 31), &DpdPolicy::default())
        .unwrap();
    // 150k due, 70k paid: 30k short on Sep 1, 50k on Dec 1.
    assert_eq!(result.past_due_amount, dec!(80_000));
    assert_eq!(result.first_arrears_date, Some(date(2024, 9, 1)));
    assert_eq!(
        result.days_past_due,
        date(2024, 12, 31)
            .signed_duration_since(date(2024, 9, 1))
            .num_days()
    );
}

#[test]
fn test_every_bucket_boundary_end_to_end() {
    // Drive the reference date across every configured bucket boundary
    // and check the classified bucket changes exactly at the boundary.
    let loan = quarterly_loan();
    let arrears_start = date(2024, 6, 1);
    let sched = schedule(&[(arrears_start, dec!(50_000))]);
    let policy = DpdPolicy::default();
    let bounds = [1, 31, 61, 91, 121, 180];
    for bound in bounds {
        let before = compute_dpd(
            &loan,
            &sched,
            &[],
            arrears_start + chrono::Duration::days(bound - 1),
            &policy,
        )
        .unwrap();
        let at = compute_dpd(
            &loan,
            &sched,
            &[],
            arrears_start + chrono::Duration::days(bound),
            &policy,
        )
        .unwrap();
        assert_eq!(
            at.bucket_value,
            before.bucket_value + 1,
            "bucket must advance exactly at {bound} days"
        );
    }
}

#[test]
fn test_bucket_fields_follow_policy_table() {
    let loan = quarterly_loan();
    let sched = schedule(&[(date(2024, 6, 1), dec!(50_000))]);
    let policy = DpdPolicy::default();
    let result =
        compute_dpd(&loan, &sched, &[], date(2024, 7, 16), &DpdPolicy::default()).unwrap();
    // 45 days past due.
    let expected = policy.buckets.classify(45).unwrap();
    assert_eq!(result.bucket, expected.label);
    assert_eq!(result.bucket_value, expected.value);
    assert_eq!(result.bucket_description, expected.description);
}

#[test]
fn test_custom_bucket_table() {
    // A three-bucket policy: Current, 1-90, 90+.
    let buckets = BucketPolicy {
        buckets: vec![
            lending_risk_core::buckets::BucketDef {
                label: "Current".into(),
                description: "Current".into(),
                lower: 0,
                upper: Some(1),
                value: 0,
                is_default: false,
            },
            lending_risk_core::buckets::BucketDef {
                label: "1-90".into(),
                description: "1-90 Days Past Due".into(),
                lower: 1,
                upper: Some(90),
                value: 1,
                is_default: false,
            },
            lending_risk_core::buckets::BucketDef {
                label: "90+".into(),
                description: "Over 90 Days Past Due".into(),
                lower: 90,
                upper: None,
                value: 2,
                is_default: true,
            },
        ],
    };
    buckets.validate().unwrap();
    let policy = DpdPolicy {
        default_threshold_days: 90,
        buckets,
    };
    let loan = quarterly_loan();
    let sched = schedule(&[(date(2024, 6, 1), dec!(50_000))]);
    let reference = date(2024, 6, 1) + chrono::Duration::days(90);
    let result = compute_dpd(&loan, &sched, &[], reference, &policy).unwrap();
    assert_eq!(result.bucket, "90+");
    assert!(result.is_default);
}
