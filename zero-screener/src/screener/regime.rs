//! Market regime profiles.
//!
//! Each regime is a closed, fully specified parameter bundle. Switching the
//! regime swaps the whole bundle; no value survives from the previous one.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{Result, ScreenerError};

// ============================================================================
// Regime
// ============================================================================

/// Market-condition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Regime {
    /// Defensive, downtrend
    Bear = 0,
    /// Range-bound, low volatility
    Sideways = 1,
    /// Momentum
    Bull = 2,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::Bear, Regime::Sideways, Regime::Bull];

    /// Numeric regime id.
    pub fn id(self) -> i64 {
        self as i64
    }

    /// Display name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Bear => "熊市(Bear)",
            Self::Sideways => "震荡市(Sideways)",
            Self::Bull => "牛市(Bull)",
        }
    }

    /// Sideways applies the strict intraday rule set.
    pub fn is_strict(self) -> bool {
        matches!(self, Self::Sideways)
    }
}

impl Default for Regime {
    fn default() -> Self {
        Self::Sideways
    }
}

impl TryFrom<i64> for Regime {
    type Error = ScreenerError;

    fn try_from(id: i64) -> Result<Self> {
        match id {
            0 => Ok(Self::Bear),
            1 => Ok(Self::Sideways),
            2 => Ok(Self::Bull),
            other => Err(ScreenerError::InvalidRegime(other)),
        }
    }
}

impl From<Regime> for i64 {
    fn from(regime: Regime) -> Self {
        regime.id()
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Regime Profile
// ============================================================================

/// Thresholds and weights for one regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeProfile {
    // Funnel
    pub pct_chg_min: f64,
    pub pct_chg_max: f64,
    pub bias_min: f64,
    pub bias_max: f64,
    pub high_close_dist_max: f64,
    /// Close-to-high floor, shared by the funnel and intraday rule F
    pub close_to_high_ratio: f64,
    pub ats_ratio_min: f64,
    /// Bid/ask level-1 volume ratio ceiling
    pub imbalance_max: f64,

    // Risk control (turnover in %, cap thresholds in yuan)
    pub turnover_max: f64,
    pub turnover_large_cap: f64,
    pub turnover_mid_cap: f64,
    pub turnover_small_cap: f64,
    pub large_cap_threshold: f64,
    pub small_cap_threshold: f64,
    pub vol_ratio_danger: f64,
    pub turnover_danger: f64,

    // Chip tiers
    pub chip_tier1_winner_rate: f64,
    pub chip_tier2_winner_rate: f64,
    pub chip_tier2_concentration: f64,

    // Intraday
    pub upper_shadow_max: f64,
    pub tail_vol_ratio_min: f64,

    // Scoring
    pub score_weight_efficiency: f64,
    pub score_weight_winner_rate: f64,
    pub score_weight_ats_ratio: f64,

    // Output
    pub top_n_candidates: usize,
    pub top_n_output: usize,
}

impl RegimeProfile {
    /// Parameter set version.
    pub const VERSION: &'static str = "2.0";

    /// Every key accepted by [`RegimeProfile::lookup`].
    pub const KEYS: [&'static str; 26] = [
        "pct_chg_min",
        "pct_chg_max",
        "bias_min",
        "bias_max",
        "high_close_dist_max",
        "close_to_high_ratio",
        "ats_ratio_min",
        "imbalance_max",
        "turnover_max",
        "turnover_large_cap",
        "turnover_mid_cap",
        "turnover_small_cap",
        "large_cap_threshold",
        "small_cap_threshold",
        "vol_ratio_danger",
        "turnover_danger",
        "chip_tier1_winner_rate",
        "chip_tier2_winner_rate",
        "chip_tier2_concentration",
        "upper_shadow_max",
        "tail_vol_ratio_min",
        "score_weight_efficiency",
        "score_weight_winner_rate",
        "score_weight_ats_ratio",
        "top_n_candidates",
        "top_n_output",
    ];

    /// Fixed parameter bundle for a regime.
    pub fn for_regime(regime: Regime) -> Self {
        match regime {
            Regime::Bear => Self {
                pct_chg_min: 0.0,
                pct_chg_max: 2.5,
                bias_min: -0.005,
                bias_max: 0.010,
                high_close_dist_max: 0.005,
                close_to_high_ratio: 0.99,
                ats_ratio_min: 1.5,
                imbalance_max: 10.0,
                turnover_max: 5.0,
                turnover_large_cap: 4.0,
                turnover_mid_cap: 6.0,
                turnover_small_cap: 8.0,
                large_cap_threshold: 200e8,
                small_cap_threshold: 50e8,
                vol_ratio_danger: 2.0,
                turnover_danger: 5.0,
                chip_tier1_winner_rate: 85.0,
                chip_tier2_winner_rate: 70.0,
                chip_tier2_concentration: 0.10,
                upper_shadow_max: 0.008,
                tail_vol_ratio_min: 0.5,
                score_weight_efficiency: 0.3,
                score_weight_winner_rate: 0.5,
                score_weight_ats_ratio: 0.2,
                top_n_candidates: 15,
                top_n_output: 6,
            },
            Regime::Sideways => Self {
                pct_chg_min: 0.5,
                pct_chg_max: 4.2,
                bias_min: -0.002,
                bias_max: 0.015,
                high_close_dist_max: 0.006,
                close_to_high_ratio: 0.98,
                ats_ratio_min: 1.3,
                imbalance_max: 10.0,
                turnover_max: 8.0,
                turnover_large_cap: 5.0,
                turnover_mid_cap: 8.0,
                turnover_small_cap: 12.0,
                large_cap_threshold: 200e8,
                small_cap_threshold: 50e8,
                vol_ratio_danger: 2.5,
                turnover_danger: 6.0,
                chip_tier1_winner_rate: 75.0,
                chip_tier2_winner_rate: 55.0,
                chip_tier2_concentration: 0.15,
                upper_shadow_max: 0.008,
                tail_vol_ratio_min: 0.6,
                score_weight_efficiency: 0.4,
                score_weight_winner_rate: 0.4,
                score_weight_ats_ratio: 0.2,
                top_n_candidates: 15,
                top_n_output: 9,
            },
            Regime::Bull => Self {
                pct_chg_min: 3.0,
                pct_chg_max: 8.5,
                bias_min: 0.005,
                bias_max: 0.05,
                high_close_dist_max: 0.008,
                close_to_high_ratio: 0.97,
                ats_ratio_min: 1.2,
                imbalance_max: 10.0,
                turnover_max: 20.0,
                turnover_large_cap: 8.0,
                turnover_mid_cap: 15.0,
                turnover_small_cap: 20.0,
                large_cap_threshold: 200e8,
                small_cap_threshold: 50e8,
                vol_ratio_danger: 3.0,
                turnover_danger: 10.0,
                chip_tier1_winner_rate: 80.0,
                chip_tier2_winner_rate: 60.0,
                chip_tier2_concentration: 0.12,
                upper_shadow_max: 0.01,
                tail_vol_ratio_min: 0.4,
                score_weight_efficiency: 0.5,
                score_weight_winner_rate: 0.3,
                score_weight_ats_ratio: 0.2,
                top_n_candidates: 15,
                top_n_output: 9,
            },
        }
    }

    /// Value of a named parameter, `None` for unknown keys.
    pub fn lookup(&self, key: &str) -> Option<f64> {
        let value = match key {
            "pct_chg_min" => self.pct_chg_min,
            "pct_chg_max" => self.pct_chg_max,
            "bias_min" => self.bias_min,
            "bias_max" => self.bias_max,
            "high_close_dist_max" => self.high_close_dist_max,
            "close_to_high_ratio" => self.close_to_high_ratio,
            "ats_ratio_min" => self.ats_ratio_min,
            "imbalance_max" => self.imbalance_max,
            "turnover_max" => self.turnover_max,
            "turnover_large_cap" => self.turnover_large_cap,
            "turnover_mid_cap" => self.turnover_mid_cap,
            "turnover_small_cap" => self.turnover_small_cap,
            "large_cap_threshold" => self.large_cap_threshold,
            "small_cap_threshold" => self.small_cap_threshold,
            "vol_ratio_danger" => self.vol_ratio_danger,
            "turnover_danger" => self.turnover_danger,
            "chip_tier1_winner_rate" => self.chip_tier1_winner_rate,
            "chip_tier2_winner_rate" => self.chip_tier2_winner_rate,
            "chip_tier2_concentration" => self.chip_tier2_concentration,
            "upper_shadow_max" => self.upper_shadow_max,
            "tail_vol_ratio_min" => self.tail_vol_ratio_min,
            "score_weight_efficiency" => self.score_weight_efficiency,
            "score_weight_winner_rate" => self.score_weight_winner_rate,
            "score_weight_ats_ratio" => self.score_weight_ats_ratio,
            "top_n_candidates" => self.top_n_candidates as f64,
            "top_n_output" => self.top_n_output as f64,
            _ => return None,
        };
        Some(value)
    }

    /// Value of a named parameter, or the caller's default for unknown keys.
    pub fn get(&self, key: &str, default: f64) -> f64 {
        self.lookup(key).unwrap_or(default)
    }

    /// Sum of the three composite-score weights.
    pub fn weights_sum(&self) -> f64 {
        self.score_weight_efficiency + self.score_weight_winner_rate + self.score_weight_ats_ratio
    }
}

impl Default for RegimeProfile {
    fn default() -> Self {
        Self::for_regime(Regime::default())
    }
}

// ============================================================================
// Strategy Context
// ============================================================================

/// Active regime together with its parameter bundle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyContext {
    regime: Regime,
    profile: RegimeProfile,
}

impl StrategyContext {
    pub fn new(regime: Regime) -> Self {
        Self {
            regime,
            profile: RegimeProfile::for_regime(regime),
        }
    }

    /// Build from a raw regime id, rejecting ids outside 0..=2.
    pub fn from_id(id: i64) -> Result<Self> {
        Ok(Self::new(Regime::try_from(id)?))
    }

    /// Switch regime, reinitializing every parameter.
    ///
    /// On error the context is left untouched.
    pub fn set_regime(&mut self, id: i64) -> Result<()> {
        *self = Self::from_id(id)?;
        Ok(())
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn profile(&self) -> &RegimeProfile {
        &self.profile
    }

    /// Named parameter lookup with explicit default.
    pub fn get(&self, key: &str, default: f64) -> f64 {
        self.profile.get(key, default)
    }

    pub fn regime_name(&self) -> &'static str {
        self.regime.label()
    }

    /// Multi-line parameter summary.
    pub fn describe(&self) -> String {
        let p = &self.profile;
        let rule = "=".repeat(60);
        [
            rule.clone(),
            format!(
                " StrategyContext v{} | 当前模式: {}",
                RegimeProfile::VERSION,
                self.regime_name()
            ),
            rule.clone(),
            "[日线漏斗参数]".to_string(),
            format!("  涨幅区间: {:.1}% ~ {:.1}%", p.pct_chg_min, p.pct_chg_max),
            format!("  VWAP偏离: {:.3} ~ {:.3}", p.bias_min, p.bias_max),
            format!("  高收盘距离上限: {:.3}", p.high_close_dist_max),
            format!("  收盘接近高点比例: {:.2}", p.close_to_high_ratio),
            format!("  大单异动下限: {:.1}", p.ats_ratio_min),
            format!("  换手率上限: {:.1}%", p.turnover_max),
            "[市值分层换手率]".to_string(),
            format!("  >200亿: {:.1}%", p.turnover_large_cap),
            format!("  50-200亿: {:.1}%", p.turnover_mid_cap),
            format!("  <50亿: {:.1}%", p.turnover_small_cap),
            format!(
                "  危险区: 换手率 > {:.1}% 且 量比 > {:.1}",
                p.turnover_danger, p.vol_ratio_danger
            ),
            "[筹码分级]".to_string(),
            format!("  Tier1 胜率 > {:.0}", p.chip_tier1_winner_rate),
            format!(
                "  Tier2 胜率 > {:.0} 且 集中度 < {:.2}",
                p.chip_tier2_winner_rate, p.chip_tier2_concentration
            ),
            "[15分钟线体检参数]".to_string(),
            format!("  上影线上限: {:.3}", p.upper_shadow_max),
            format!("  尾盘量比下限: {:.1}", p.tail_vol_ratio_min),
            "[评分权重]".to_string(),
            format!("  效率: {:.1}%", p.score_weight_efficiency * 100.0),
            format!("  胜率: {:.1}%", p.score_weight_winner_rate * 100.0),
            format!("  大单异动: {:.1}%", p.score_weight_ats_ratio * 100.0),
            format!("[输出] 候选池 {} / 输出 {}", p.top_n_candidates, p.top_n_output),
            rule,
        ]
        .join("\n")
    }
}

impl Default for StrategyContext {
    fn default() -> Self {
        Self::new(Regime::default())
    }
}
