use chrono::NaiveDate;
use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use lending_risk_core::delinquency::{compute_dpd, DpdPolicy};
use lending_risk_core::types::{LoanRecord, PaymentEvent, PaymentScheduleEntry};

use crate::input;

/// Arguments for a single-loan DPD computation
#[derive(Args)]
pub struct DpdArgs {
    /// Path to a JSON file holding loan, schedule, payments, reference_date
    #[arg(long)]
    pub input: Option<String>,

    /// Reference date override, YYYY-MM-DD
    #[arg(long)]
    pub reference_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct DpdInput {
    loan: LoanRecord,
    #[serde(default)]
    schedule: Vec<PaymentScheduleEntry>,
    #[serde(default)]
    payments: Vec<PaymentEvent>,
    reference_date: NaiveDate,
    #[serde(default)]
    policy: DpdPolicy,
}

pub fn run_dpd(args: DpdArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut dpd_input: DpdInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input is required (or pipe JSON to stdin)".into());
    };

    if let Some(reference_date) = args.reference_date {
        dpd_input.reference_date = reference_date;
    }

    dpd_input.policy.validate()?;
    let result = compute_dpd(
        &dpd_input.loan,
        &dpd_input.schedule,
        &dpd_input.payments,
        dpd_input.reference_date,
        &dpd_input.policy,
    )?;
    Ok(serde_json::to_value(&result)?)
}
