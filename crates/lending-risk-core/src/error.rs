use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LendingRiskError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data integrity error in {record}: {reason}")]
    DataIntegrity { record: String, reason: String },

    #[error(
        "No pricing band covers product '{product_type}' at tenor {tenor_days} days, amount {amount}"
    )]
    NoMatchingBand {
        product_type: String,
        tenor_days: Decimal,
        amount: Decimal,
    },

    #[error(
        "Ambiguous pricing grid: {matches} bands cover product '{product_type}' at tenor {tenor_days} days, amount {amount}"
    )]
    AmbiguousBand {
        product_type: String,
        tenor_days: Decimal,
        amount: Decimal,
        matches: usize,
    },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for LendingRiskError {
    fn from(e: serde_json::Error) -> Self {
        LendingRiskError::Serialization(e.to_string())
    }
}
