//! Ordering and final selection.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::tier::{Candidate, ChipTier};

/// Default Tier-1 count that restricts output to Tier 1.
pub const DEFAULT_TIER1_QUORUM: usize = 5;

/// Output order: tier ascending, score descending, symbol ascending.
pub fn candidate_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.tier
        .cmp(&b.tier)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.symbol().cmp(b.symbol()))
}

/// Sort candidates into output order.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(candidate_order);
}

/// Final ordered output of the selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub candidates: Vec<Candidate>,
    /// Tier-1 candidates available before truncation
    pub tier1_count: usize,
    /// Whether the quorum rule restricted output to Tier 1
    pub tier1_only: bool,
}

impl Selection {
    pub fn symbols(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.symbol()).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Candidate-pool truncation and the Tier-1 quorum rule.
#[derive(Debug, Clone)]
pub struct Selector {
    candidate_pool: usize,
    output_size: usize,
    tier1_quorum: usize,
}

impl Selector {
    pub fn new(candidate_pool: usize, output_size: usize, tier1_quorum: usize) -> Self {
        Self {
            candidate_pool,
            output_size,
            tier1_quorum,
        }
    }

    /// Sorted candidates truncated to the candidate pool.
    ///
    /// The ranked table is for reporting; [`Selector::select`] does not read it.
    pub fn rank(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        let mut ranked = candidates.to_vec();
        sort_candidates(&mut ranked);
        ranked.truncate(self.candidate_pool);
        ranked
    }

    /// Apply the quorum rule to the full candidate set.
    ///
    /// With at least `tier1_quorum` Tier-1 names only Tier 1 is kept;
    /// otherwise the tiered order is used as is. Either way the result is
    /// truncated to `output_size`.
    pub fn select(&self, candidates: &[Candidate]) -> Selection {
        let mut sorted = candidates.to_vec();
        sort_candidates(&mut sorted);

        let tier1_count = sorted.iter().filter(|c| c.tier == ChipTier::Tier1).count();
        let tier1_only = tier1_count >= self.tier1_quorum;
        if tier1_only {
            sorted.retain(|c| c.tier == ChipTier::Tier1);
        }
        sorted.truncate(self.output_size);

        Selection {
            candidates: sorted,
            tier1_count,
            tier1_only,
        }
    }
}
