//! Feature derivation.
//!
//! Inner-joins the T-1 baseline with the T snapshot on symbol and computes
//! the ratios the funnel, risk control and scorer read. Instruments missing
//! from either side are dropped; no baseline is ever synthesized.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::{BaselineRecord, SnapshotRecord};

/// Denominator guard for every derived ratio.
pub const EPSILON: f64 = 1e-9;
/// Added to turnover before dividing price change by it.
pub const EFFICIENCY_DAMPING: f64 = 0.001;
/// Shares per lot.
pub const SHARES_PER_LOT: f64 = 100.0;
/// Baseline share counts and market values are stored in units of 10,000.
pub const BASELINE_UNIT: f64 = 10_000.0;

/// Derived per-instrument features for one evaluation date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub symbol: String,
    pub close: f64,
    pub high: f64,
    /// Volume (lots)
    pub volume_lots: f64,
    /// Amount (yuan)
    pub amount: f64,
    /// Volume-weighted average price
    pub vwap: f64,
    /// Turnover rate (%) of free float
    pub turnover_rate: f64,
    /// (close - vwap) / vwap
    pub bias: f64,
    /// Percent change vs prior close
    pub pct_chg: f64,
    /// Average trade size (yuan per trade)
    pub ats: f64,
    /// Average trade size vs prior day
    pub ats_ratio: f64,
    /// Percent change per unit of turnover
    pub efficiency: f64,
    /// (high - close) / close
    pub high_close_dist: f64,
    /// close / high
    pub close_to_high: f64,
    /// Today's lots vs prior-day lots
    pub vol_ratio: f64,
    /// Market value (yuan), `None` when not collected
    pub float_mv: Option<f64>,
    /// Level-1 bid/ask volume ratio; `None` when either side is missing or zero
    pub bid_ask_imbalance: Option<f64>,
    /// Chip winner rate (%), zero when not collected
    pub winner_rate: f64,
    pub cost_concentration: Option<f64>,
    pub sum_inst_net: Option<f64>,
    pub list_count: Option<f64>,
    pub margin_cap_ratio: Option<f64>,
}

impl FeatureRow {
    /// Compute features for one matched baseline/snapshot pair.
    pub fn derive(baseline: &BaselineRecord, snap: &SnapshotRecord) -> Self {
        let float_share = baseline.float_share.unwrap_or(0.0);
        let pre_close = baseline.pre_close.unwrap_or(0.0);
        let pre_vol = baseline.pre_vol.unwrap_or(0.0);
        let pre_ats = baseline.pre_ats.unwrap_or(0.0);
        let trade_count = snap.trade_count.unwrap_or(0.0);

        let vol_shares = snap.volume * SHARES_PER_LOT;
        let vwap = snap.amount / (vol_shares + EPSILON);
        let turnover_rate = vol_shares / (float_share * BASELINE_UNIT + EPSILON) * 100.0;
        let pct_chg = (snap.close - pre_close) / (pre_close + EPSILON) * 100.0;
        let ats = snap.amount / (trade_count + EPSILON);

        let bid_ask_imbalance = match (snap.bid_vol1, snap.ask_vol1) {
            (Some(bid), Some(ask)) if bid > 0.0 && ask > 0.0 => Some(bid / (ask + EPSILON)),
            _ => None,
        };

        Self {
            symbol: snap.symbol.clone(),
            close: snap.close,
            high: snap.high,
            volume_lots: snap.volume,
            amount: snap.amount,
            vwap,
            turnover_rate,
            bias: (snap.close - vwap) / (vwap + EPSILON),
            pct_chg,
            ats,
            ats_ratio: ats / (pre_ats + EPSILON),
            efficiency: pct_chg / (turnover_rate + EFFICIENCY_DAMPING),
            high_close_dist: (snap.high - snap.close) / (snap.close + EPSILON),
            close_to_high: snap.close / (snap.high + EPSILON),
            vol_ratio: snap.volume / (pre_vol + EPSILON),
            float_mv: baseline.total_mv.map(|mv| mv * BASELINE_UNIT),
            bid_ask_imbalance,
            winner_rate: baseline.winner_rate.unwrap_or(0.0),
            cost_concentration: baseline.cost_concentration,
            sum_inst_net: baseline.sum_inst_net,
            list_count: baseline.list_count,
            margin_cap_ratio: baseline.margin_cap_ratio,
        }
    }
}

/// Join baseline and snapshot tables and derive one row per matched symbol.
///
/// Duplicate baseline rows for a symbol are merged (non-zero wins); for
/// duplicate snapshot rows the last one is used. Output is ordered by symbol.
pub fn derive_features(baselines: &[BaselineRecord], snapshots: &[SnapshotRecord]) -> Vec<FeatureRow> {
    let mut by_symbol: BTreeMap<&str, BaselineRecord> = BTreeMap::new();
    for record in baselines {
        by_symbol
            .entry(record.symbol.as_str())
            .and_modify(|existing| existing.merge(record))
            .or_insert_with(|| record.clone());
    }

    let snaps: BTreeMap<&str, &SnapshotRecord> =
        snapshots.iter().map(|s| (s.symbol.as_str(), s)).collect();

    snaps
        .into_iter()
        .filter_map(|(symbol, snap)| {
            by_symbol
                .get(symbol)
                .map(|baseline| FeatureRow::derive(baseline, snap))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn baseline(symbol: &str) -> BaselineRecord {
        let mut b = BaselineRecord::new(symbol, NaiveDate::from_ymd_opt(2025, 12, 18).unwrap());
        b.float_share = Some(100_000.0); // 1e9 shares
        b.total_mv = Some(1_000_000.0); // 100e8 yuan
        b.pre_close = Some(10.0);
        b.pre_vol = Some(50_000.0);
        b.pre_ats = Some(20_000.0);
        b.winner_rate = Some(78.0);
        b.cost_concentration = Some(0.11);
        b
    }

    fn snapshot(symbol: &str) -> SnapshotRecord {
        SnapshotRecord {
            symbol: symbol.into(),
            trade_date: NaiveDate::from_ymd_opt(2025, 12, 19).unwrap(),
            open: 10.0,
            high: 10.25,
            low: 9.98,
            close: 10.2,
            volume: 100_000.0,
            amount: 101_000_000.0,
            trade_count: Some(3_000.0),
            bid_vol1: Some(200.0),
            ask_vol1: Some(100.0),
        }
    }

    #[test]
    fn test_derived_values() {
        let row = FeatureRow::derive(&baseline("600000.SH"), &snapshot("600000.SH"));

        assert!((row.vwap - 10.1).abs() < 1e-6);
        assert!((row.turnover_rate - 1.0).abs() < 1e-6);
        assert!((row.pct_chg - 2.0).abs() < 1e-6);
        assert!((row.bias - (10.2 - 10.1) / 10.1).abs() < 1e-6);
        assert!((row.ats_ratio - 101_000_000.0 / 3_000.0 / 20_000.0).abs() < 1e-6);
        assert!((row.efficiency - 2.0 / 1.001).abs() < 1e-6);
        assert!((row.vol_ratio - 2.0).abs() < 1e-9);
        assert!((row.close_to_high - 10.2 / 10.25).abs() < 1e-9);
        assert!((row.float_mv.unwrap() - 100e8).abs() < 1.0);
        assert!((row.bid_ask_imbalance.unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_denominators_stay_finite() {
        let mut b = BaselineRecord::new("000001.SZ", NaiveDate::from_ymd_opt(2025, 12, 18).unwrap());
        b.pre_close = Some(0.0);
        let mut s = snapshot("000001.SZ");
        s.volume = 0.0;
        s.trade_count = None;
        s.bid_vol1 = Some(0.0);

        let row = FeatureRow::derive(&b, &s);
        for v in [
            row.vwap,
            row.turnover_rate,
            row.pct_chg,
            row.ats_ratio,
            row.efficiency,
            row.vol_ratio,
        ] {
            assert!(v.is_finite());
        }
        assert!(row.pct_chg > 1e9);
        assert_eq!(row.bid_ask_imbalance, None);
        assert_eq!(row.winner_rate, 0.0);
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let baselines = vec![baseline("600000.SH"), baseline("000002.SZ")];
        let snapshots = vec![snapshot("600000.SH"), snapshot("300750.SZ")];

        let rows = derive_features(&baselines, &snapshots);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "600000.SH");
    }

    #[test]
    fn test_duplicate_baselines_merged() {
        let mut partial = BaselineRecord::new("600000.SH", NaiveDate::from_ymd_opt(2025, 12, 18).unwrap());
        partial.winner_rate = Some(0.0);
        partial.list_count = Some(3.0);

        let rows = derive_features(&[baseline("600000.SH"), partial], &[snapshot("600000.SH")]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].winner_rate, 78.0);
        assert_eq!(rows[0].list_count, Some(3.0));
    }

    #[test]
    fn test_output_sorted_by_symbol() {
        let symbols = ["600519.SH", "000001.SZ", "300750.SZ"];
        let baselines: Vec<_> = symbols.iter().map(|s| baseline(s)).collect();
        let snapshots: Vec<_> = symbols.iter().rev().map(|s| snapshot(s)).collect();

        let rows = derive_features(&baselines, &snapshots);
        let order: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["000001.SZ", "300750.SZ", "600519.SH"]);
    }
}
