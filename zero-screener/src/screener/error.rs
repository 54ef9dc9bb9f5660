//! Errors that abort a screening run.
//!
//! Per-instrument degeneracy (zero denominators, short bar series) never
//! surfaces here; those degrade to large-finite values or fail reasons.

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::ProviderError;

/// Result type alias for screener operations.
pub type Result<T> = std::result::Result<T, ScreenerError>;

/// Fatal screening errors.
#[derive(Error, Debug)]
pub enum ScreenerError {
    /// No T-1 baseline collected for the date
    #[error("No baseline data for {date}")]
    MissingBaseline { date: NaiveDate },

    /// Upstream returned no snapshot rows for the date
    #[error("Empty daily snapshot for {date}")]
    EmptySnapshot { date: NaiveDate },

    /// Regime id outside 0..=2
    #[error("Invalid regime: {0}. Must be 0, 1, or 2")]
    InvalidRegime(i64),

    /// Data source failure
    #[error("Data source error: {0}")]
    Provider(#[from] ProviderError),
}

impl From<ScreenerError> for zero_common::Error {
    fn from(err: ScreenerError) -> Self {
        match err {
            ScreenerError::InvalidRegime(_) => Self::InvalidInput(err.to_string()),
            ScreenerError::MissingBaseline { .. } | ScreenerError::EmptySnapshot { .. } => {
                Self::NotFound(err.to_string())
            }
            ScreenerError::Provider(_) => Self::Internal(err.to_string()),
        }
    }
}
