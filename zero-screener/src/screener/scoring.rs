//! Composite scoring.
//!
//! Each axis is converted to a percentile rank within the day's surviving
//! set, so scores stay comparable across days with different raw ranges.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::regime::RegimeProfile;
use super::tier::{Candidate, ScoreRanks};

/// Tolerance for the weights-sum-to-one convention.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Percentile rank of each value, in (0, 1].
///
/// Ties share the average of the ranks they span; rank `r` (1-based) maps
/// to `r / n`. Output order matches input order.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1 ..= end
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg_rank / n as f64;
        }
        start = end;
    }
    ranks
}

/// Weights for the three scoring axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub efficiency: f64,
    pub winner_rate: f64,
    pub ats_ratio: f64,
}

impl ScoreWeights {
    pub fn from_profile(profile: &RegimeProfile) -> Self {
        Self {
            efficiency: profile.score_weight_efficiency,
            winner_rate: profile.score_weight_winner_rate,
            ats_ratio: profile.score_weight_ats_ratio,
        }
    }

    pub fn sum(&self) -> f64 {
        self.efficiency + self.winner_rate + self.ats_ratio
    }

    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }
}

/// Weighted sum of percentile ranks.
#[derive(Debug, Clone)]
pub struct CompositeScorer {
    weights: ScoreWeights,
}

impl CompositeScorer {
    /// Weights are used as given; a sum away from 1 is only logged.
    pub fn new(weights: ScoreWeights) -> Self {
        if !weights.is_normalized() {
            warn!(
                sum = weights.sum(),
                "Score weights do not sum to 1, composite scores may exceed [0, 1]"
            );
        }
        Self { weights }
    }

    pub fn from_profile(profile: &RegimeProfile) -> Self {
        Self::new(ScoreWeights::from_profile(profile))
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    /// Fill `ranks` and `score` for every candidate in place.
    pub fn score(&self, candidates: &mut [Candidate]) {
        if candidates.is_empty() {
            return;
        }

        let axis = |f: fn(&Candidate) -> f64| -> Vec<f64> {
            percentile_ranks(&candidates.iter().map(f).collect::<Vec<_>>())
        };
        let eff = axis(|c| c.features.efficiency);
        let win = axis(|c| c.features.winner_rate);
        let ats = axis(|c| c.features.ats_ratio);

        for (i, candidate) in candidates.iter_mut().enumerate() {
            candidate.ranks = ScoreRanks {
                efficiency: eff[i],
                winner_rate: win[i],
                ats_ratio: ats[i],
            };
            candidate.score = eff[i] * self.weights.efficiency
                + win[i] * self.weights.winner_rate
                + ats[i] * self.weights.ats_ratio;
        }
    }
}
