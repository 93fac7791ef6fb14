use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use lending_risk_core::pricing::{rate_variance, PricingGrid};

use crate::input;

/// Arguments for a pricing-band lookup
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct BandArgs {
    /// Path to the pricing grid file (JSON or YAML)
    #[arg(long)]
    pub grid: String,

    /// Loan tenor in days
    #[arg(long)]
    pub tenor_days: Decimal,

    /// Loan amount
    #[arg(long)]
    pub amount: Decimal,

    /// Product type key into the grid
    #[arg(long)]
    pub product_type: String,

    /// Optional loan APR; when given, the APR-vs-grid spread is reported
    #[arg(long)]
    pub apr: Option<Decimal>,
}

pub fn run_band(args: BandArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let grid: PricingGrid = input::file::read_policy(&args.grid)?;
    grid.validate()?;

    let band = grid.match_band(args.tenor_days, args.amount, &args.product_type)?;
    let mut value = serde_json::to_value(band)?;
    if let (Some(apr), Value::Object(map)) = (args.apr, &mut value) {
        map.insert(
            "rate_variance".into(),
            serde_json::to_value(rate_variance(apr, band))?,
        );
    }
    Ok(json!({ "band": value }))
}
