//! Market data module for the end-of-day screener.
//!
//! Holds the record types the pipeline consumes and the storage/provider
//! seams that supply them.
//!
//! # Units
//! - `volume` fields are in lots (100 shares)
//! - `amount` fields are in yuan
//! - `float_share` is in units of 10,000 shares, `total_mv` in 10,000 yuan

mod memory;
mod provider;
pub mod local_storage;

pub use memory::MemoryMarketData;
pub use provider::{BarArchive, BaselineStore, ProviderError, SnapshotSource};
pub use local_storage::{LocalStorage, LocalStorageConfig, LocalStorageStats};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// Baseline Record (T-1)
// ============================================================================

/// Prior-trading-day reference data for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    /// Stock symbol (e.g., "000001.SZ")
    pub symbol: String,
    /// Trade date the baseline describes
    pub trade_date: NaiveDate,
    /// Free-float shares (10,000 shares)
    pub float_share: Option<f64>,
    /// Total market value (10,000 yuan)
    pub total_mv: Option<f64>,
    /// Five-day aggregate institutional net buy (yuan)
    pub sum_inst_net: Option<f64>,
    /// Institutional survey / spotlight count
    pub list_count: Option<f64>,
    /// Chip winner rate (%)
    pub winner_rate: Option<f64>,
    /// Chip cost concentration, see [`cost_concentration`]
    pub cost_concentration: Option<f64>,
    /// Margin balance as a share of market value
    pub margin_cap_ratio: Option<f64>,
    /// Prior close
    pub pre_close: Option<f64>,
    /// Prior volume (lots)
    pub pre_vol: Option<f64>,
    /// Prior average trade size (yuan per trade)
    pub pre_ats: Option<f64>,
}

impl BaselineRecord {
    /// Create an empty baseline for a symbol and date.
    pub fn new(symbol: impl Into<String>, trade_date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            trade_date,
            float_share: None,
            total_mv: None,
            sum_inst_net: None,
            list_count: None,
            winner_rate: None,
            cost_concentration: None,
            margin_cap_ratio: None,
            pre_close: None,
            pre_vol: None,
            pre_ats: None,
        }
    }

    /// Merge a later write for the same (symbol, date) into this record.
    ///
    /// A non-zero value in `other` wins; zero or missing values never
    /// overwrite what is already there.
    pub fn merge(&mut self, other: &BaselineRecord) {
        merge_field(&mut self.float_share, other.float_share);
        merge_field(&mut self.total_mv, other.total_mv);
        merge_field(&mut self.sum_inst_net, other.sum_inst_net);
        merge_field(&mut self.list_count, other.list_count);
        merge_field(&mut self.winner_rate, other.winner_rate);
        merge_field(&mut self.cost_concentration, other.cost_concentration);
        merge_field(&mut self.margin_cap_ratio, other.margin_cap_ratio);
        merge_field(&mut self.pre_close, other.pre_close);
        merge_field(&mut self.pre_vol, other.pre_vol);
        merge_field(&mut self.pre_ats, other.pre_ats);
    }
}

fn merge_field(current: &mut Option<f64>, incoming: Option<f64>) {
    match incoming {
        Some(v) if v != 0.0 => *current = Some(v),
        Some(v) if current.is_none() => *current = Some(v),
        _ => {}
    }
}

/// Chip cost concentration from the 95th and 5th percentile holding costs.
///
/// Returns `None` when the costs do not sum to a positive value.
pub fn cost_concentration(cost_95pct: f64, cost_5pct: f64) -> Option<f64> {
    let sum = cost_95pct + cost_5pct;
    if sum > 0.0 {
        Some((cost_95pct - cost_5pct) / sum)
    } else {
        None
    }
}

/// Margin balance (yuan) relative to total market value (10,000 yuan).
pub fn margin_cap_ratio(margin_balance: f64, total_mv: f64) -> Option<f64> {
    let mv_yuan = total_mv * 10_000.0;
    if mv_yuan > 0.0 {
        Some(margin_balance / mv_yuan)
    } else {
        None
    }
}

// ============================================================================
// Snapshot Record (T)
// ============================================================================

/// End-of-day quote for one instrument on the evaluation date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Volume (lots)
    pub volume: f64,
    /// Turnover amount (yuan)
    pub amount: f64,
    /// Number of trades, absent in historical daily data
    pub trade_count: Option<f64>,
    /// Level-1 bid volume
    pub bid_vol1: Option<f64>,
    /// Level-1 ask volume
    pub ask_vol1: Option<f64>,
}

impl SnapshotRecord {
    /// Fill microstructure fields missing from historical daily bars.
    ///
    /// Trade count is estimated as one trade per five lots (at least one).
    /// The level-1 book is set to a neutral 1.0 per side only when both
    /// sides are absent; a half-recorded book is left as is.
    pub fn with_simulated_microstructure(mut self) -> Self {
        if self.trade_count.is_none() {
            self.trade_count = Some((self.volume / 5.0).floor().max(1.0));
        }
        if self.bid_vol1.is_none() && self.ask_vol1.is_none() {
            self.bid_vol1 = Some(1.0);
            self.ask_vol1 = Some(1.0);
        }
        self
    }
}

// ============================================================================
// Intraday Bar
// ============================================================================

/// One fixed-interval intraday bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayBar {
    pub symbol: String,
    /// Bar timestamp (exchange local time)
    pub bar_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Volume (lots)
    pub volume: f64,
    /// Amount (yuan)
    pub amount: f64,
}

impl IntradayBar {
    /// Typical price (high + low + close) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Upper shadow length: high above the body top.
    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }
}
