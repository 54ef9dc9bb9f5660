//! Screener engine module.
//!
//! Orchestrates one screening run from stored inputs to the final ranked
//! selection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zero_common::logging::generate_trace_id;

use crate::data::{BarArchive, BaselineStore, SnapshotRecord, SnapshotSource};

use super::config::{ResolvedConfig, ScreenerConfig};
use super::error::{Result, ScreenerError};
use super::features::derive_features;
use super::funnel::{AdaptiveRiskControl, FilterStage, FunnelFilter, StageResult};
use super::intraday::{CandidateValidation, IntradayStructureValidator, ValidationOutcome};
use super::regime::{Regime, RegimeProfile};
use super::scoring::CompositeScorer;
use super::selector::{Selection, Selector};
use super::tier::{Candidate, ChipTierClassifier};

// ============================================================================
// Screener Result
// ============================================================================

/// Result of a screening run.
///
/// For the same inputs and config, `ranked`, `selection`, `stage_results`
/// and `validations` are identical across runs. `id` is fresh per run, so
/// the serialized result as a whole is not byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerResult {
    /// Run id (trace id of the run), unique per run
    pub id: String,
    pub regime: Regime,
    /// Parameter set version
    pub profile_version: String,
    /// Evaluation date (T)
    pub target_date: NaiveDate,
    /// Baseline date (T-1)
    pub baseline_date: NaiveDate,
    /// Tiered, scored candidates truncated to the candidate pool (reporting only)
    pub ranked: Vec<Candidate>,
    /// Final ordered output
    pub selection: Selection,
    /// Per-stage pass/eliminate counts
    pub stage_results: Vec<StageResult>,
    /// Intraday verdicts, empty when the intraday pass is off
    pub validations: Vec<CandidateValidation>,
    /// Snapshot rows scanned
    pub total_scanned: usize,
}

impl ScreenerResult {
    /// Counts for one stage, if it ran.
    pub fn stage(&self, stage: FilterStage) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| r.stage == stage)
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Screened {} stocks for {} ({}): {} ranked, {} selected{}",
            self.total_scanned,
            self.target_date,
            self.regime,
            self.ranked.len(),
            self.selection.len(),
            if self.selection.tier1_only {
                " (tier 1 only)"
            } else {
                ""
            }
        )
    }
}

/// Outcome for one date pair of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub target_date: NaiveDate,
    pub baseline_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScreenerResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchEntry {
    pub fn is_ok(&self) -> bool {
        self.result.is_some()
    }
}

// ============================================================================
// Screener Engine
// ============================================================================

/// The main screener engine.
///
/// Runs the pipeline stages in order:
/// 1. Load baseline (T-1) and snapshot (T)
/// 2. Derive features, funnel, risk control
/// 3. Chip tiering and composite scoring
/// 4. Ranking and quorum selection
/// 5. Optional intraday structure check on the selection
pub struct ScreenerEngine<D> {
    config: ResolvedConfig,
    source: Arc<D>,
    funnel: FunnelFilter,
    risk: AdaptiveRiskControl,
    tiers: ChipTierClassifier,
    scorer: CompositeScorer,
    selector: Selector,
    validator: IntradayStructureValidator,
}

impl<D> ScreenerEngine<D>
where
    D: BaselineStore + SnapshotSource + BarArchive,
{
    /// Create an engine. Fails on an invalid regime before touching data.
    pub fn new(config: &ScreenerConfig, source: Arc<D>) -> Result<Self> {
        let config = config.resolve()?;
        let regime = config.context.regime();
        let profile = *config.context.profile();

        Ok(Self {
            funnel: FunnelFilter::new(profile),
            risk: AdaptiveRiskControl::new(profile),
            tiers: ChipTierClassifier::new(&profile),
            scorer: CompositeScorer::from_profile(&profile),
            selector: Selector::new(
                config.candidate_pool,
                config.output_size,
                config.tier1_quorum,
            ),
            validator: IntradayStructureValidator::new(regime, &profile),
            config,
            source,
        })
    }

    pub fn regime(&self) -> Regime {
        self.config.context.regime()
    }

    pub fn profile(&self) -> &RegimeProfile {
        self.config.context.profile()
    }

    /// Run the pipeline for one evaluation date against its baseline date.
    pub async fn run(&self, target_date: NaiveDate, baseline_date: NaiveDate) -> Result<ScreenerResult> {
        let trace_id = generate_trace_id();
        let regime = self.regime();

        info!(
            trace_id = %trace_id,
            regime = %regime,
            target_date = %target_date,
            baseline_date = %baseline_date,
            "Starting screening run"
        );

        let baselines = self.source.get_baseline(baseline_date).await?;
        if baselines.is_empty() {
            return Err(ScreenerError::MissingBaseline { date: baseline_date });
        }

        let snapshots = self.source.get_daily_snapshot(target_date).await?;
        if snapshots.is_empty() {
            return Err(ScreenerError::EmptySnapshot { date: target_date });
        }
        let total_scanned = snapshots.len();
        let snapshots = fill_microstructure(snapshots);

        // Stage 1: join and derive
        let features = derive_features(&baselines, &snapshots);
        let input = StageResult::new(FilterStage::Input, total_scanned, features.len());
        info!(
            trace_id = %trace_id,
            baselines = baselines.len(),
            snapshots = total_scanned,
            joined = features.len(),
            "Input joined"
        );

        // Stage 2: funnel
        let (features, funnel) = self.funnel.apply(features);
        log_stage(&trace_id, &funnel);

        // Stage 3: adaptive risk control
        let (features, risk) = self.risk.apply(features);
        log_stage(&trace_id, &risk);

        // Stage 4: chip tiers and scores
        let (mut candidates, tiers) = self.tiers.apply(features);
        log_stage(&trace_id, &tiers);
        self.scorer.score(&mut candidates);

        // Stage 5: rank and select
        let ranked = self.selector.rank(&candidates);
        let mut selection = self.selector.select(&candidates);
        let selected = StageResult::new(FilterStage::Selection, candidates.len(), selection.len());
        info!(
            trace_id = %trace_id,
            ranked = ranked.len(),
            selected = selection.len(),
            tier1_count = selection.tier1_count,
            tier1_only = selection.tier1_only,
            "Selection complete"
        );

        let mut stage_results = vec![input, funnel, risk, tiers, selected];

        // Stage 6: intraday structure
        let mut validations = Vec::new();
        if self.config.intraday_enabled {
            let before = selection.len();
            validations = self.validate_intraday(&trace_id, target_date, &selection).await;
            let passed: Vec<&str> = validations
                .iter()
                .filter(|v| v.outcome.passed)
                .map(|v| v.symbol.as_str())
                .collect();
            selection
                .candidates
                .retain(|c| passed.contains(&c.symbol()));

            let intraday = StageResult::new(FilterStage::Intraday, before, selection.len());
            log_stage(&trace_id, &intraday);
            stage_results.push(intraday);
        }

        let result = ScreenerResult {
            id: trace_id,
            regime,
            profile_version: RegimeProfile::VERSION.to_string(),
            target_date,
            baseline_date,
            ranked,
            selection,
            stage_results,
            validations,
            total_scanned,
        };

        info!(trace_id = %result.id, "{}", result.summary());
        Ok(result)
    }

    /// Run several (target, baseline) pairs in order.
    ///
    /// A failing pair is recorded as an error entry; later pairs still run.
    pub async fn run_batch(&self, pairs: &[(NaiveDate, NaiveDate)]) -> Vec<BatchEntry> {
        let mut entries = Vec::with_capacity(pairs.len());

        for &(target_date, baseline_date) in pairs {
            let entry = match self.run(target_date, baseline_date).await {
                Ok(result) => BatchEntry {
                    target_date,
                    baseline_date,
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    warn!(
                        target_date = %target_date,
                        baseline_date = %baseline_date,
                        error = %e,
                        "Screening run failed, continuing batch"
                    );
                    BatchEntry {
                        target_date,
                        baseline_date,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            entries.push(entry);
        }

        let ok = entries.iter().filter(|e| e.is_ok()).count();
        info!(total = entries.len(), ok, failed = entries.len() - ok, "Batch complete");
        entries
    }

    // ========================================================================
    // Internal Methods
    // ========================================================================

    async fn validate_intraday(
        &self,
        trace_id: &str,
        date: NaiveDate,
        selection: &Selection,
    ) -> Vec<CandidateValidation> {
        let mut validations = Vec::with_capacity(selection.len());

        for candidate in &selection.candidates {
            let symbol = candidate.symbol();
            let bars = match self.source.get_intraday_bars(symbol, date).await {
                Ok(bars) => bars,
                Err(e) => {
                    warn!(
                        trace_id = %trace_id,
                        symbol = %symbol,
                        error = %e,
                        recoverable = e.is_recoverable(),
                        "Failed to load intraday bars"
                    );
                    Vec::new()
                }
            };

            let outcome = if bars.is_empty() {
                warn!(trace_id = %trace_id, symbol = %symbol, "No intraday bars");
                ValidationOutcome::insufficient_data()
            } else {
                self.validator.validate(&bars, Some(candidate.features.high))
            };

            if outcome.passed {
                info!(trace_id = %trace_id, "[PASS] {}", symbol);
            } else {
                info!(trace_id = %trace_id, "[FAIL] {} ({})", symbol, outcome.reason());
            }

            validations.push(CandidateValidation {
                symbol: symbol.to_string(),
                bar_count: bars.len(),
                outcome,
            });
        }

        validations
    }
}

/// Simulate trade count and book volumes where historical data lacks them.
fn fill_microstructure(snapshots: Vec<SnapshotRecord>) -> Vec<SnapshotRecord> {
    let missing = snapshots.iter().filter(|s| s.trade_count.is_none()).count();
    if missing > 0 {
        debug!(missing, "Simulating microstructure for historical snapshot rows");
    }
    snapshots
        .into_iter()
        .map(SnapshotRecord::with_simulated_microstructure)
        .collect()
}

fn log_stage(trace_id: &str, result: &StageResult) {
    info!(
        trace_id = %trace_id,
        stage = %result.stage,
        passed = result.passed,
        eliminated = result.eliminated,
        elimination_rate = format!("{:.1}%", result.elimination_rate),
        "Stage complete"
    );
}
