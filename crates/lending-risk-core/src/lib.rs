pub mod aggregate;
pub mod buckets;
pub mod delinquency;
pub mod error;
pub mod lifecycle;
pub mod pricing;
pub mod report;
pub mod types;

pub use error::LendingRiskError;
pub use types::*;

/// Standard result type for all lending-risk operations
pub type LendingRiskResult<T> = Result<T, LendingRiskError>;
