//! Elimination stages of the screener.
//!
//! Implements the two hard-threshold stages:
//! 1. Funnel: price, VWAP bias, close position, order book and trade size
//! 2. Adaptive risk control: cap-tiered turnover ceilings and a danger zone

use serde::{Deserialize, Serialize};

use super::features::FeatureRow;
use super::regime::RegimeProfile;

// ============================================================================
// Filter Stage
// ============================================================================

/// Filter stage identifier for tracking where stocks are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// Joined baseline/snapshot rows
    Input,
    /// Funnel thresholds
    Funnel,
    /// Turnover ceilings and danger zone
    RiskControl,
    /// Chip tier classification
    ChipTier,
    /// Final selection
    Selection,
    /// Intraday structure check
    Intraday,
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "输入"),
            Self::Funnel => write!(f, "漏斗筛选"),
            Self::RiskControl => write!(f, "自适应风控"),
            Self::ChipTier => write!(f, "筹码分级"),
            Self::Selection => write!(f, "最终结果"),
            Self::Intraday => write!(f, "15分钟线体检"),
        }
    }
}

// ============================================================================
// Stage Result
// ============================================================================

/// Counts for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: FilterStage,
    /// Number of stocks that passed this stage
    pub passed: usize,
    /// Number of stocks eliminated at this stage
    pub eliminated: usize,
    /// Elimination rate (%)
    pub elimination_rate: f64,
}

impl StageResult {
    pub fn new(stage: FilterStage, input_count: usize, passed_count: usize) -> Self {
        let eliminated = input_count.saturating_sub(passed_count);
        let elimination_rate = if input_count > 0 {
            (eliminated as f64 / input_count as f64) * 100.0
        } else {
            0.0
        };

        Self {
            stage,
            passed: passed_count,
            eliminated,
            elimination_rate,
        }
    }
}

// ============================================================================
// Funnel Filter
// ============================================================================

/// Individual funnel predicates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunnelCheck {
    PctChange,
    Bias,
    HighCloseDistance,
    CloseToHigh,
    Imbalance,
    AtsRatio,
}

/// Conjunctive threshold filter. Any failing predicate removes the row.
#[derive(Debug, Clone)]
pub struct FunnelFilter {
    profile: RegimeProfile,
}

impl FunnelFilter {
    pub fn new(profile: RegimeProfile) -> Self {
        Self { profile }
    }

    /// First failing predicate, or `None` when the row passes.
    ///
    /// Comparisons are negated so a NaN feature fails its check.
    pub fn failed_check(&self, row: &FeatureRow) -> Option<FunnelCheck> {
        let p = &self.profile;

        if !(row.pct_chg >= p.pct_chg_min && row.pct_chg <= p.pct_chg_max) {
            return Some(FunnelCheck::PctChange);
        }
        if !(row.bias >= p.bias_min && row.bias <= p.bias_max) {
            return Some(FunnelCheck::Bias);
        }
        if !(row.high_close_dist < p.high_close_dist_max) {
            return Some(FunnelCheck::HighCloseDistance);
        }
        if !(row.close_to_high >= p.close_to_high_ratio) {
            return Some(FunnelCheck::CloseToHigh);
        }
        // missing book data passes
        if let Some(imbalance) = row.bid_ask_imbalance {
            if !(imbalance < p.imbalance_max) {
                return Some(FunnelCheck::Imbalance);
            }
        }
        if !(row.ats_ratio > p.ats_ratio_min) {
            return Some(FunnelCheck::AtsRatio);
        }

        None
    }

    pub fn passes(&self, row: &FeatureRow) -> bool {
        self.failed_check(row).is_none()
    }

    /// Keep passing rows, preserving order.
    pub fn apply(&self, rows: Vec<FeatureRow>) -> (Vec<FeatureRow>, StageResult) {
        let input_count = rows.len();
        let passed: Vec<FeatureRow> = rows.into_iter().filter(|r| self.passes(r)).collect();
        let result = StageResult::new(FilterStage::Funnel, input_count, passed.len());
        (passed, result)
    }
}

// ============================================================================
// Adaptive Risk Control
// ============================================================================

/// Market-cap bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapBucket {
    Large,
    Mid,
    Small,
}

impl CapBucket {
    /// Bucket for a market value in yuan. Unknown values fall in `Mid`.
    pub fn classify(float_mv: Option<f64>, profile: &RegimeProfile) -> Self {
        match float_mv {
            Some(mv) if mv > profile.large_cap_threshold => Self::Large,
            Some(mv) if mv > profile.small_cap_threshold => Self::Mid,
            Some(mv) if mv <= profile.small_cap_threshold => Self::Small,
            _ => Self::Mid,
        }
    }

    pub fn turnover_ceiling(self, profile: &RegimeProfile) -> f64 {
        match self {
            Self::Large => profile.turnover_large_cap,
            Self::Mid => profile.turnover_mid_cap,
            Self::Small => profile.turnover_small_cap,
        }
    }
}

/// Outcome of the risk-control check for one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RiskVerdict {
    Pass,
    /// Turnover above the cap bucket's ceiling
    AboveCapCeiling { bucket: CapBucket, ceiling: f64 },
    /// Turnover above the regime-wide ceiling
    AboveGlobalCeiling,
    /// Turnover and volume ratio both in the danger zone
    DangerZone,
}

/// Cap-tiered turnover ceilings plus the compound danger-zone exclusion.
#[derive(Debug, Clone)]
pub struct AdaptiveRiskControl {
    profile: RegimeProfile,
}

impl AdaptiveRiskControl {
    pub fn new(profile: RegimeProfile) -> Self {
        Self { profile }
    }

    pub fn evaluate(&self, row: &FeatureRow) -> RiskVerdict {
        let p = &self.profile;
        let bucket = CapBucket::classify(row.float_mv, p);
        let ceiling = bucket.turnover_ceiling(p);

        if !(row.turnover_rate <= ceiling) {
            return RiskVerdict::AboveCapCeiling { bucket, ceiling };
        }
        if !(row.turnover_rate <= p.turnover_max) {
            return RiskVerdict::AboveGlobalCeiling;
        }
        if row.turnover_rate > p.turnover_danger && row.vol_ratio > p.vol_ratio_danger {
            return RiskVerdict::DangerZone;
        }

        RiskVerdict::Pass
    }

    pub fn passes(&self, row: &FeatureRow) -> bool {
        self.evaluate(row) == RiskVerdict::Pass
    }

    /// Keep passing rows, preserving order.
    pub fn apply(&self, rows: Vec<FeatureRow>) -> (Vec<FeatureRow>, StageResult) {
        let input_count = rows.len();
        let passed: Vec<FeatureRow> = rows.into_iter().filter(|r| self.passes(r)).collect();
        let result = StageResult::new(FilterStage::RiskControl, input_count, passed.len());
        (passed, result)
    }
}
