//! Zero Screener Library
//!
//! Adaptive multi-stage screening for A-shares: regime-dependent funnel,
//! cap-tiered risk control, chip tiering, percentile scoring and an optional
//! intraday structure check.
//!
//! # Key Concepts
//!
//! ## Regimes
//! - **Bear (0)**: tight price window, strict chip thresholds
//! - **Sideways (1)**: defensive accumulation, full intraday rule set
//! - **Bull (2)**: momentum window, relaxed turnover ceilings
//!
//! ## Inputs
//! - Baseline (T-1): float shares, market value, chip and flow data
//! - Snapshot (T): end-of-day quotes
//! - Intraday bars (T): 15-minute bars for the closing-session check

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod screener;

pub use data::{BaselineRecord, IntradayBar, LocalStorage, MemoryMarketData, SnapshotRecord};
pub use screener::{Regime, ScreenerConfig, ScreenerEngine, ScreenerError, ScreenerResult};
