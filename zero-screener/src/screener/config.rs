//! Screener configuration module.
//!
//! Caller-supplied run parameters. Values left unset fall back to the
//! active regime profile.

use serde::{Deserialize, Serialize};
use zero_common::config::Config;

use super::error::Result;
use super::regime::{Regime, StrategyContext};
use super::selector::DEFAULT_TIER1_QUORUM;

/// Configuration for a screening run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Market regime id (0 = bear, 1 = sideways, 2 = bull)
    #[serde(default = "default_regime")]
    pub regime: i64,

    /// Size of the ranked candidate table reported in the result; regime
    /// default when unset. Reporting only: selection and the intraday check
    /// read the full tiered list, bounded by `output_size`.
    #[serde(default)]
    pub candidate_pool: Option<usize>,

    /// Maximum names in the final selection; regime default when unset
    #[serde(default)]
    pub output_size: Option<usize>,

    /// Tier-1 count at which output is restricted to Tier 1
    #[serde(default = "default_tier1_quorum")]
    pub tier1_quorum: usize,

    /// Run the intraday structure check on the selection
    #[serde(default)]
    pub intraday_enabled: bool,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            regime: default_regime(),
            candidate_pool: None,
            output_size: None,
            tier1_quorum: default_tier1_quorum(),
            intraday_enabled: false,
        }
    }
}

fn default_regime() -> i64 {
    Regime::Sideways.id()
}

fn default_tier1_quorum() -> usize {
    DEFAULT_TIER1_QUORUM
}

/// Fully validated run parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedConfig {
    pub context: StrategyContext,
    pub candidate_pool: usize,
    pub output_size: usize,
    pub tier1_quorum: usize,
    pub intraday_enabled: bool,
}

impl ScreenerConfig {
    /// Build from the `screener` section of the global config.
    pub fn from_global(config: &Config) -> Self {
        let section = config.screener_section();
        let defaults = Self::default();
        Self {
            regime: section.regime.unwrap_or(defaults.regime),
            candidate_pool: section.candidate_pool,
            output_size: section.output_size,
            tier1_quorum: section.tier1_quorum.unwrap_or(defaults.tier1_quorum),
            intraday_enabled: section.intraday_enabled.unwrap_or(defaults.intraday_enabled),
        }
    }

    /// Validate the regime and fill regime defaults.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let context = StrategyContext::from_id(self.regime)?;
        let profile = context.profile();
        Ok(ResolvedConfig {
            context,
            candidate_pool: self.candidate_pool.unwrap_or(profile.top_n_candidates),
            output_size: self.output_size.unwrap_or(profile.top_n_output),
            tier1_quorum: self.tier1_quorum,
            intraday_enabled: self.intraday_enabled,
        })
    }
}
