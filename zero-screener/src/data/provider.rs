//! Data source abstractions consumed by the screener.
//!
//! The pipeline reads three tables: the T-1 baseline, the T daily snapshot
//! and (for the intraday pass) per-symbol bar series. Each comes from its
//! own trait so callers can mix a local store with a live feed.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;

use super::{BaselineRecord, IntradayBar, SnapshotRecord};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors raised by data sources.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Underlying store failed (SQLite, filesystem)
    Storage(String),
    /// Data not available for the requested symbol/date
    DataNotAvailable(String),
    /// Source is temporarily unavailable
    Unavailable(String),
    /// Invalid request parameters
    InvalidRequest(String),
    /// Internal source error
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::Unavailable(msg) => write!(f, "Source unavailable: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Storage(_))
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }
}

// ============================================================================
// Source Traits
// ============================================================================

/// Store of T-1 baseline records.
#[async_trait]
pub trait BaselineStore: Send + Sync {
    /// All baseline records for a trade date. Empty when none were collected.
    async fn get_baseline(&self, date: NaiveDate) -> Result<Vec<BaselineRecord>, ProviderError>;

    /// Persist baseline records, merging per field into existing rows.
    async fn save_baseline(&self, records: &[BaselineRecord]) -> Result<usize, ProviderError>;
}

/// Source of end-of-day quotes.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Market-wide daily snapshot for a trade date.
    async fn get_daily_snapshot(&self, date: NaiveDate)
        -> Result<Vec<SnapshotRecord>, ProviderError>;
}

/// Archive of intraday bars.
#[async_trait]
pub trait BarArchive: Send + Sync {
    /// Bars for one symbol on one date, oldest first.
    async fn get_intraday_bars(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Vec<IntradayBar>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::DataNotAvailable("baseline 2025-12-18".into());
        assert_eq!(err.to_string(), "Data not available: baseline 2025-12-18");
    }

    #[test]
    fn test_provider_error_recoverable() {
        assert!(ProviderError::Unavailable("busy".into()).is_recoverable());
        assert!(!ProviderError::InvalidRequest("bad date".into()).is_recoverable());
    }

    #[test]
    fn test_from_anyhow() {
        let err: ProviderError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, ProviderError::Storage(ref m) if m.contains("disk full")));
    }
}
