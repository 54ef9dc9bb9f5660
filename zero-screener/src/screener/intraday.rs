//! Intraday structure validation.
//!
//! Re-checks a candidate's closing session on its last five intraday bars:
//!
//! - A: close above the tail-window VWAP
//! - B: last three lows non-decreasing
//! - C: no blow-off upper shadow in the tail
//! - D: close above the open three bars back
//! - E: tail volume has not collapsed vs the day (Sideways only)
//! - F: close near the daily high (Sideways only, needs the daily high)

use serde::{Deserialize, Serialize};
use std::fmt;

use super::features::EPSILON;
use super::regime::{Regime, RegimeProfile};
use crate::data::IntradayBar;

/// Bars examined at the end of the session.
pub const TAIL_BARS: usize = 5;
/// Shortest series the rules can be evaluated on.
pub const MIN_BARS: usize = 3;

/// Rule identifiers, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCode {
    InsufficientData,
    A,
    B,
    C,
    D,
    E,
    F,
}

impl RuleCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientData => "insufficient data",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
        }
    }
}

impl fmt::Display for RuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed rule with a human-readable detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub code: RuleCode,
    pub detail: String,
}

impl RuleFailure {
    fn new(code: RuleCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            RuleCode::InsufficientData => f.write_str(&self.detail),
            code => write!(f, "{}:{}", code, self.detail),
        }
    }
}

/// Result of validating one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    /// Failed rules in evaluation order
    pub failures: Vec<RuleFailure>,
}

impl ValidationOutcome {
    fn from_failures(failures: Vec<RuleFailure>) -> Self {
        Self {
            passed: failures.is_empty(),
            failures,
        }
    }

    pub fn insufficient_data() -> Self {
        Self::from_failures(vec![RuleFailure::new(
            RuleCode::InsufficientData,
            "insufficient data",
        )])
    }

    pub fn codes(&self) -> Vec<RuleCode> {
        self.failures.iter().map(|f| f.code).collect()
    }

    /// Failure reasons joined for log output.
    pub fn reason(&self) -> String {
        self.failures
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Per-candidate validation record kept in the run result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateValidation {
    pub symbol: String,
    pub bar_count: usize,
    pub outcome: ValidationOutcome,
}

/// Bar-structure checks, strictness set by the regime.
#[derive(Debug, Clone)]
pub struct IntradayStructureValidator {
    regime: Regime,
    upper_shadow_max: f64,
    tail_vol_ratio_min: f64,
    close_to_high_ratio: f64,
}

impl IntradayStructureValidator {
    pub fn new(regime: Regime, profile: &RegimeProfile) -> Self {
        Self {
            regime,
            upper_shadow_max: profile.upper_shadow_max,
            tail_vol_ratio_min: profile.tail_vol_ratio_min,
            close_to_high_ratio: profile.close_to_high_ratio,
        }
    }

    /// Validate a day's bars (oldest first).
    ///
    /// `daily_high` enables rule F under Sideways when positive.
    pub fn validate(&self, bars: &[IntradayBar], daily_high: Option<f64>) -> ValidationOutcome {
        let tail = &bars[bars.len().saturating_sub(TAIL_BARS)..];
        if tail.len() < MIN_BARS {
            return ValidationOutcome::insufficient_data();
        }

        let mut failures = Vec::new();
        let last = &tail[tail.len() - 1];
        let close = last.close;
        let last3 = &tail[tail.len() - 3..];

        // A
        let vwap = approx_vwap(tail);
        if !(close > vwap) {
            failures.push(RuleFailure::new(
                RuleCode::A,
                format!("低于VWAP({:.3} <= {:.3})", close, vwap),
            ));
        }

        // B
        let lows_rising = last3.windows(2).all(|w| w[1].low >= w[0].low);
        if !lows_rising {
            failures.push(RuleFailure::new(RuleCode::B, "低点下移"));
        }

        // C
        let worst_shadow = tail
            .iter()
            .map(|b| b.upper_shadow() / (b.close + EPSILON))
            .fold(f64::NEG_INFINITY, f64::max);
        if worst_shadow > self.upper_shadow_max {
            failures.push(RuleFailure::new(
                RuleCode::C,
                format!("上影线过长({:.2}%)", worst_shadow * 100.0),
            ));
        }

        // D
        if !(close > last3[0].open) {
            failures.push(RuleFailure::new(RuleCode::D, "下午阴跌"));
        }

        if self.regime.is_strict() {
            // E
            let ratio = tail_volume_ratio(bars, last3);
            if !(ratio >= self.tail_vol_ratio_min) {
                failures.push(RuleFailure::new(
                    RuleCode::E,
                    format!("尾盘缩量({:.1}%)", ratio * 100.0),
                ));
            }

            // F
            if let Some(high) = daily_high.filter(|h| *h > 0.0) {
                let near_high = close / high;
                if !(near_high >= self.close_to_high_ratio) {
                    failures.push(RuleFailure::new(
                        RuleCode::F,
                        format!("远离日高点({:.1}%)", near_high * 100.0),
                    ));
                }
            }
        }

        ValidationOutcome::from_failures(failures)
    }
}

/// Volume-weighted typical price over the window.
fn approx_vwap(window: &[IntradayBar]) -> f64 {
    let (value, volume) = window.iter().fold((0.0, 0.0), |(value, volume), b| {
        (value + b.typical_price() * b.volume, volume + b.volume)
    });
    value / (volume + EPSILON)
}

/// Mean volume of the closing bars vs the mean bar volume of the whole day.
fn tail_volume_ratio(day: &[IntradayBar], closing: &[IntradayBar]) -> f64 {
    let mean = |bars: &[IntradayBar]| bars.iter().map(|b| b.volume).sum::<f64>() / bars.len() as f64;
    mean(closing) / (mean(day) + EPSILON)
}
