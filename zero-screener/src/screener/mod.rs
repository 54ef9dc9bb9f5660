//! Adaptive end-of-day screener.
//!
//! Turns yesterday's baseline and today's snapshot into a ranked, tiered
//! candidate list under one of three market regimes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      自适应选股流水线                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐           │
//! │  │ Baseline T-1│────▶│  Features   │────▶│   Funnel    │           │
//! │  │ Snapshot T  │     │  (join)     │     │  (regime)   │           │
//! │  └─────────────┘     └─────────────┘     └──────┬──────┘           │
//! │                                                 │                   │
//! │  ┌─────────────┐     ┌─────────────┐     ┌──────▼──────┐           │
//! │  │  Selector   │◀────│  Scorer     │◀────│ Risk + Tier │           │
//! │  │  (quorum)   │     │ (percentile)│     │             │           │
//! │  └──────┬──────┘     └─────────────┘     └─────────────┘           │
//! │         │                                                           │
//! │  ┌──────▼──────────────────┐                                        │
//! │  │ Intraday check (opt.)   │                                        │
//! │  └─────────────────────────┘                                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use zero_screener::screener::{ScreenerConfig, ScreenerEngine};
//!
//! let engine = ScreenerEngine::new(&ScreenerConfig::default(), storage)?;
//! let result = engine.run(target_date, baseline_date).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod funnel;
pub mod intraday;
pub mod regime;
pub mod scoring;
pub mod selector;
pub mod tier;

pub use config::{ResolvedConfig, ScreenerConfig};
pub use engine::{BatchEntry, ScreenerEngine, ScreenerResult};
pub use error::{Result, ScreenerError};
pub use features::{derive_features, FeatureRow};
pub use funnel::{AdaptiveRiskControl, CapBucket, FilterStage, FunnelCheck, FunnelFilter, RiskVerdict, StageResult};
pub use intraday::{
    CandidateValidation, IntradayStructureValidator, RuleCode, RuleFailure, ValidationOutcome,
};
pub use regime::{Regime, RegimeProfile, StrategyContext};
pub use scoring::{percentile_ranks, CompositeScorer, ScoreWeights};
pub use selector::{sort_candidates, Selection, Selector};
pub use tier::{Candidate, ChipTier, ChipTierClassifier, ScoreRanks};
