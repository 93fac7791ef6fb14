use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};

use lending_risk_core::lifecycle::{track_clients, LifecyclePolicy, ReportingWindow};
use lending_risk_core::types::LoanRecord;

use crate::input;

/// Arguments for client lifecycle classification
#[derive(Args)]
pub struct LifecycleArgs {
    /// Path to a JSON file holding loans and the reporting window
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Deserialize)]
struct LifecycleInput {
    loans: Vec<LoanRecord>,
    reporting_window: ReportingWindow,
    #[serde(default)]
    policy: LifecyclePolicy,
}

pub fn run_lifecycle(args: LifecycleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let lifecycle_input: LifecycleInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input is required (or pipe JSON to stdin)".into());
    };

    let (clients, client_goals) = track_clients(
        &lifecycle_input.loans,
        &lifecycle_input.reporting_window,
        &lifecycle_input.policy,
    )?;
    Ok(json!({
        "clients": clients,
        "client_goals": client_goals,
    }))
}
