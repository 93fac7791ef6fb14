use chrono::NaiveDate;
use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use lending_risk_core::report::{build_report, ReportPolicy};
use lending_risk_core::types::PortfolioSnapshot;

use crate::input;

/// Arguments for the full portfolio report
#[derive(Args)]
pub struct ReportArgs {
    /// Path to a JSON file holding snapshot, reference_date and policy
    #[arg(long)]
    pub input: Option<String>,

    /// Path to the snapshot JSON (loans, schedule, payments)
    #[arg(long)]
    pub snapshot: Option<String>,

    /// Path to the report policy file (JSON or YAML)
    #[arg(long)]
    pub policy: Option<String>,

    /// Reference date, YYYY-MM-DD
    #[arg(long)]
    pub reference_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct ReportInput {
    snapshot: PortfolioSnapshot,
    reference_date: NaiveDate,
    policy: ReportPolicy,
}

pub fn run_report(args: ReportArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let report_input: ReportInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let snapshot_path = args
            .snapshot
            .ok_or("--snapshot is required (or provide --input)")?;
        let policy_path = args
            .policy
            .ok_or("--policy is required (or provide --input)")?;
        let reference_date = args
            .reference_date
            .ok_or("--reference-date is required (or provide --input)")?;
        ReportInput {
            snapshot: input::file::read_json(&snapshot_path)?,
            reference_date,
            policy: input::file::read_policy(&policy_path)?,
        }
    };

    let report = build_report(
        &report_input.snapshot,
        report_input.reference_date,
        &report_input.policy,
    )?;
    Ok(serde_json::to_value(&report)?)
}
