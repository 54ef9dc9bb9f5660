//! Chip tier classification.
//!
//! Tier 1 is checked first and wins outright; Tier 2 additionally needs a
//! tight cost concentration. Everything else is rejected.

use serde::{Deserialize, Serialize};

use super::features::FeatureRow;
use super::funnel::{FilterStage, StageResult};
use super::regime::RegimeProfile;

/// Ordinal chip quality tier. Lower non-zero values rank first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ChipTier {
    Rejected = 0,
    Tier1 = 1,
    Tier2 = 2,
}

impl ChipTier {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_accepted(self) -> bool {
        self != Self::Rejected
    }
}

impl From<ChipTier> for u8 {
    fn from(tier: ChipTier) -> Self {
        tier.as_u8()
    }
}

impl TryFrom<u8> for ChipTier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Rejected),
            1 => Ok(Self::Tier1),
            2 => Ok(Self::Tier2),
            other => Err(format!("invalid chip tier: {}", other)),
        }
    }
}

/// Percentile ranks along the three scoring axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRanks {
    pub efficiency: f64,
    pub winner_rate: f64,
    pub ats_ratio: f64,
}

/// A tiered, scored row. Serialized flat so every regime yields the same columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub features: FeatureRow,
    pub tier: ChipTier,
    /// Composite score, set by the scorer
    pub score: f64,
    pub ranks: ScoreRanks,
}

impl Candidate {
    pub fn new(features: FeatureRow, tier: ChipTier) -> Self {
        Self {
            features,
            tier,
            score: 0.0,
            ranks: ScoreRanks::default(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.features.symbol
    }
}

/// Assigns chip tiers from winner rate and cost concentration.
#[derive(Debug, Clone)]
pub struct ChipTierClassifier {
    tier1_winner_rate: f64,
    tier2_winner_rate: f64,
    tier2_concentration: f64,
}

impl ChipTierClassifier {
    pub fn new(profile: &RegimeProfile) -> Self {
        Self {
            tier1_winner_rate: profile.chip_tier1_winner_rate,
            tier2_winner_rate: profile.chip_tier2_winner_rate,
            tier2_concentration: profile.chip_tier2_concentration,
        }
    }

    /// Classify one instrument. A missing concentration never reaches Tier 2.
    pub fn classify(&self, winner_rate: f64, concentration: Option<f64>) -> ChipTier {
        if winner_rate > self.tier1_winner_rate {
            return ChipTier::Tier1;
        }
        let tight = concentration.is_some_and(|c| c < self.tier2_concentration);
        if winner_rate > self.tier2_winner_rate && tight {
            ChipTier::Tier2
        } else {
            ChipTier::Rejected
        }
    }

    /// Tier every row and drop the rejected ones, preserving order.
    pub fn apply(&self, rows: Vec<FeatureRow>) -> (Vec<Candidate>, StageResult) {
        let input_count = rows.len();
        let candidates: Vec<Candidate> = rows
            .into_iter()
            .filter_map(|row| {
                let tier = self.classify(row.winner_rate, row.cost_concentration);
                tier.is_accepted().then(|| Candidate::new(row, tier))
            })
            .collect();
        let result = StageResult::new(FilterStage::ChipTier, input_count, candidates.len());
        (candidates, result)
    }
}
