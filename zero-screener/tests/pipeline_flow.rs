//! End-to-end tests for the screening pipeline.
//!
//! Drives the engine through the in-memory source and the SQLite store:
//! Baseline + Snapshot → Funnel → Risk control → Tiers → Selection → Intraday
//!
//! Fixtures are built backwards from the features each instrument should
//! end up with, so every scenario states its intent in feature terms.

use chrono::{Duration, NaiveDate};
use std::sync::Arc;

use zero_screener::data::{
    BarArchive, BaselineRecord, BaselineStore, IntradayBar, LocalStorage, LocalStorageConfig,
    MemoryMarketData, SnapshotRecord,
};
use zero_screener::screener::{
    ChipTier, FilterStage, Regime, RuleCode, ScreenerConfig, ScreenerEngine, ScreenerError,
};

// ============================================================================
// Test Data Generators
// ============================================================================

const FLOAT_SHARE: f64 = 10_000.0; // 1e8 shares, in units of 10k
const PRE_CLOSE: f64 = 10.0;

fn target() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 19).unwrap()
}

fn baseline_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 18).unwrap()
}

/// Desired features for one instrument.
#[derive(Clone)]
struct Profile {
    symbol: String,
    pct_chg: f64,
    turnover: f64,
    winner_rate: f64,
    concentration: Option<f64>,
    market_value: f64,
    ats_ratio: f64,
}

impl Profile {
    /// Mid-cap name that clears every Sideways funnel and risk check.
    fn clean(symbol: impl Into<String>, winner_rate: f64) -> Self {
        Self {
            symbol: symbol.into(),
            pct_chg: 2.0,
            turnover: 3.0,
            winner_rate,
            concentration: Some(0.10),
            market_value: 100e8,
            ats_ratio: 1.6,
        }
    }

    fn close(&self) -> f64 {
        PRE_CLOSE * (1.0 + self.pct_chg / 100.0)
    }

    fn records(&self) -> (BaselineRecord, SnapshotRecord) {
        let close = self.close();
        let high = close / 0.996;
        let vwap = close / 1.005;
        let volume = self.turnover * FLOAT_SHARE;
        let amount = vwap * volume * 100.0;
        let trade_count = (volume / 5.0).floor();
        let ats = amount / trade_count;

        let mut baseline = BaselineRecord::new(&self.symbol, baseline_date());
        baseline.float_share = Some(FLOAT_SHARE);
        baseline.total_mv = Some(self.market_value / 10_000.0);
        baseline.winner_rate = Some(self.winner_rate);
        baseline.cost_concentration = self.concentration;
        baseline.pre_close = Some(PRE_CLOSE);
        baseline.pre_vol = Some(volume / 1.2);
        baseline.pre_ats = Some(ats / self.ats_ratio);

        let snapshot = SnapshotRecord {
            symbol: self.symbol.clone(),
            trade_date: target(),
            open: PRE_CLOSE,
            high,
            low: PRE_CLOSE * 0.995,
            close,
            volume,
            amount,
            trade_count: Some(trade_count),
            bid_vol1: Some(1.0),
            ask_vol1: Some(1.0),
        };

        (baseline, snapshot)
    }
}

/// Flat morning then a steady five-bar climb into `close`.
fn healthy_bars(symbol: &str, close: f64) -> Vec<IntradayBar> {
    let start = target().and_hms_opt(9, 30, 0).unwrap();
    let base = close * 0.98;
    let mut bars = Vec::new();

    for i in 0..11 {
        bars.push(IntradayBar {
            symbol: symbol.to_string(),
            bar_time: start + Duration::minutes(15 * (i + 1)),
            open: base,
            high: base * 1.001,
            low: base * 0.999,
            close: base,
            volume: 1_000.0,
            amount: base * 100_000.0,
        });
    }

    let mut prev = base;
    for k in (0..5).rev() {
        let c = close * (1.0 - 0.004 * k as f64);
        bars.push(IntradayBar {
            symbol: symbol.to_string(),
            bar_time: start + Duration::minutes(15 * (bars.len() as i64 + 1)),
            open: prev,
            high: c,
            low: prev * 0.998,
            close: c,
            volume: 1_000.0,
            amount: c * 100_000.0,
        });
        prev = c;
    }

    bars
}

async fn seed(store: &MemoryMarketData, profiles: &[Profile]) {
    let (baselines, snapshots): (Vec<_>, Vec<_>) = profiles.iter().map(Profile::records).unzip();
    store.save_baseline(&baselines).await.unwrap();
    store.insert_snapshot(target(), snapshots).await;
}

fn engine_with(
    store: Arc<MemoryMarketData>,
    regime: i64,
    intraday: bool,
) -> ScreenerEngine<MemoryMarketData> {
    let config = ScreenerConfig {
        regime,
        intraday_enabled: intraday,
        ..Default::default()
    };
    ScreenerEngine::new(&config, store).unwrap()
}

/// X tier 1, W tier 2, Y over the price window, Z over turnover, V weak chips.
fn mixed_market() -> Vec<Profile> {
    vec![
        Profile {
            concentration: Some(0.5),
            ..Profile::clean("X.SH", 82.0)
        },
        Profile::clean("W.SZ", 60.0),
        Profile {
            pct_chg: 4.5,
            ..Profile::clean("Y.SZ", 90.0)
        },
        Profile {
            turnover: 9.0,
            ..Profile::clean("Z.SH", 90.0)
        },
        Profile::clean("V.SZ", 40.0),
    ]
}

// ============================================================================
// Pipeline Scenarios
// ============================================================================

#[tokio::test]
async fn test_sideways_pipeline_stages() {
    let store = Arc::new(MemoryMarketData::new());
    seed(&store, &mixed_market()).await;

    // snapshot-only name has no baseline and is dropped by the join
    let (_, orphan) = Profile::clean("ORPHAN.SZ", 90.0).records();
    let mut snapshots: Vec<SnapshotRecord> = mixed_market().iter().map(|p| p.records().1).collect();
    snapshots.push(orphan);
    store.insert_snapshot(target(), snapshots).await;

    let result = engine_with(store, 1, false)
        .run(target(), baseline_date())
        .await
        .unwrap();

    assert_eq!(result.regime, Regime::Sideways);
    assert_eq!(result.total_scanned, 6);

    let passed = |stage| result.stage(stage).unwrap().passed;
    assert_eq!(passed(FilterStage::Input), 5);
    assert_eq!(passed(FilterStage::Funnel), 4);
    assert_eq!(passed(FilterStage::RiskControl), 3);
    assert_eq!(passed(FilterStage::ChipTier), 2);
    assert!(result.stage(FilterStage::Intraday).is_none());

    let ranked: Vec<(&str, ChipTier)> = result
        .ranked
        .iter()
        .map(|c| (c.symbol(), c.tier))
        .collect();
    assert_eq!(ranked, vec![("X.SH", ChipTier::Tier1), ("W.SZ", ChipTier::Tier2)]);

    assert!(!result.selection.tier1_only);
    assert_eq!(result.selection.symbols(), vec!["X.SH", "W.SZ"]);
    assert!(result.validations.is_empty());
}

#[tokio::test]
async fn test_zero_candidates_is_not_an_error() {
    let store = Arc::new(MemoryMarketData::new());
    seed(&store, &[Profile::clean("V.SZ", 10.0)]).await;

    let result = engine_with(store, 1, false)
        .run(target(), baseline_date())
        .await
        .unwrap();
    assert!(result.ranked.is_empty());
    assert!(result.selection.is_empty());
    assert_eq!(result.stage(FilterStage::ChipTier).unwrap().eliminated, 1);
}

#[tokio::test]
async fn test_quorum_keeps_only_tier1() {
    let mut profiles: Vec<Profile> = ["T1A", "T1B", "T1C", "T1D", "T1E"]
        .into_iter()
        .map(|s| Profile {
            pct_chg: 1.0,
            ..Profile::clean(s, 76.0)
        })
        .collect();
    // tier 2 with far stronger raw efficiency
    profiles.push(Profile {
        pct_chg: 4.0,
        turnover: 0.5,
        ..Profile::clean("T2", 74.0)
    });

    let store = Arc::new(MemoryMarketData::new());
    seed(&store, &profiles).await;
    let result = engine_with(store, 1, false)
        .run(target(), baseline_date())
        .await
        .unwrap();

    assert_eq!(result.ranked.len(), 6);
    assert!(result.selection.tier1_only);
    assert_eq!(result.selection.len(), 5);
    assert!(result
        .selection
        .candidates
        .iter()
        .all(|c| c.tier == ChipTier::Tier1));
}

#[tokio::test]
async fn test_bear_output_cap() {
    // Bear: pct in [0, 2.5], bias <= 0.01, tier 1 above 85
    let profiles: Vec<Profile> = (0..10)
        .map(|i| Profile {
            pct_chg: 1.0 + i as f64 * 0.1,
            ats_ratio: 1.8,
            ..Profile::clean(format!("B{:02}.SH", i), 90.0)
        })
        .collect();

    let store = Arc::new(MemoryMarketData::new());
    seed(&store, &profiles).await;
    let result = engine_with(store, 0, false)
        .run(target(), baseline_date())
        .await
        .unwrap();

    assert_eq!(result.ranked.len(), 10);
    assert_eq!(result.selection.len(), 6);
    for pair in result.selection.candidates.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_intraday_pass_drops_failures() {
    let store = Arc::new(MemoryMarketData::new());
    let x = Profile {
        concentration: Some(0.5),
        ..Profile::clean("X.SH", 82.0)
    };
    let w = Profile::clean("W.SZ", 60.0);
    let n = Profile::clean("N.SZ", 65.0);
    seed(&store, &[x.clone(), w.clone(), n]).await;

    store.insert_bars("X.SH", healthy_bars("X.SH", x.close())).await;
    let two = healthy_bars("W.SZ", w.close());
    store.insert_bars("W.SZ", two[two.len() - 2..].to_vec()).await;
    // N.SZ has no bars at all

    let result = engine_with(store, 1, true)
        .run(target(), baseline_date())
        .await
        .unwrap();

    assert_eq!(result.selection.symbols(), vec!["X.SH"]);
    assert_eq!(result.validations.len(), 3);

    let by_symbol = |s: &str| {
        result
            .validations
            .iter()
            .find(|v| v.symbol == s)
            .unwrap()
    };
    assert!(by_symbol("X.SH").outcome.passed);
    assert_eq!(by_symbol("W.SZ").bar_count, 2);
    assert_eq!(
        by_symbol("W.SZ").outcome.codes(),
        vec![RuleCode::InsufficientData]
    );
    assert_eq!(by_symbol("N.SZ").bar_count, 0);
    assert!(!by_symbol("N.SZ").outcome.passed);

    let intraday = result.stage(FilterStage::Intraday).unwrap();
    assert_eq!(intraday.passed, 1);
    assert_eq!(intraday.eliminated, 2);
}

#[tokio::test]
async fn test_deterministic_output() {
    let store = Arc::new(MemoryMarketData::new());
    let profiles: Vec<Profile> = (0..12)
        .map(|i| Profile {
            pct_chg: 0.8 + (i % 4) as f64 * 0.5,
            turnover: 1.0 + (i % 3) as f64,
            ..Profile::clean(format!("D{:02}.SZ", i), if i % 2 == 0 { 80.0 } else { 60.0 })
        })
        .collect();
    seed(&store, &profiles).await;
    let engine = engine_with(store, 1, false);

    let first = engine.run(target(), baseline_date()).await.unwrap();
    let second = engine.run(target(), baseline_date()).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(
        serde_json::to_string(&first.ranked).unwrap(),
        serde_json::to_string(&second.ranked).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.selection).unwrap(),
        serde_json::to_string(&second.selection).unwrap()
    );
    assert_eq!(first.stage_results, second.stage_results);
}

#[tokio::test]
async fn test_candidate_pool_bounds_ranked_table_only() {
    let store = Arc::new(MemoryMarketData::new());
    seed(&store, &mixed_market()).await;
    let config = ScreenerConfig {
        candidate_pool: Some(1),
        ..Default::default()
    };

    let result = ScreenerEngine::new(&config, store)
        .unwrap()
        .run(target(), baseline_date())
        .await
        .unwrap();

    assert_eq!(result.ranked.len(), 1);
    assert_eq!(result.ranked[0].symbol(), "X.SH");
    assert_eq!(result.selection.symbols(), vec!["X.SH", "W.SZ"]);
}

#[tokio::test]
async fn test_half_recorded_book_passes_imbalance() {
    let store = Arc::new(MemoryMarketData::new());
    let profile = Profile::clean("H.SZ", 80.0);
    let (baseline, mut snapshot) = profile.records();
    snapshot.bid_vol1 = Some(50.0);
    snapshot.ask_vol1 = None;

    store.save_baseline(&[baseline]).await.unwrap();
    store.insert_snapshot(target(), vec![snapshot]).await;

    let result = engine_with(store, 1, false)
        .run(target(), baseline_date())
        .await
        .unwrap();

    assert_eq!(result.stage(FilterStage::Funnel).unwrap().passed, 1);
    assert_eq!(result.selection.symbols(), vec!["H.SZ"]);
    assert_eq!(result.ranked[0].features.bid_ask_imbalance, None);
}

#[tokio::test]
async fn test_lopsided_book_still_eliminated() {
    let store = Arc::new(MemoryMarketData::new());
    let (baseline, mut snapshot) = Profile::clean("L.SZ", 80.0).records();
    snapshot.bid_vol1 = Some(50.0);
    snapshot.ask_vol1 = Some(1.0);

    store.save_baseline(&[baseline]).await.unwrap();
    store.insert_snapshot(target(), vec![snapshot]).await;

    let result = engine_with(store, 1, false)
        .run(target(), baseline_date())
        .await
        .unwrap();

    assert_eq!(result.stage(FilterStage::Funnel).unwrap().passed, 0);
    assert!(result.selection.is_empty());
}

#[tokio::test]
async fn test_missing_baseline_reported() {
    let store = Arc::new(MemoryMarketData::new());
    let (_, snap) = Profile::clean("X.SH", 80.0).records();
    store.insert_snapshot(target(), vec![snap]).await;

    let err = engine_with(store, 1, false)
        .run(target(), baseline_date())
        .await
        .unwrap_err();
    assert!(matches!(err, ScreenerError::MissingBaseline { .. }));
}

#[tokio::test]
async fn test_batch_mixes_success_and_failure() {
    let store = Arc::new(MemoryMarketData::new());
    seed(&store, &mixed_market()).await;
    let engine = engine_with(store, 1, false);

    let later = NaiveDate::from_ymd_opt(2025, 12, 22).unwrap();
    let entries = engine
        .run_batch(&[(later, target()), (target(), baseline_date())])
        .await;

    assert!(!entries[0].is_ok());
    assert!(entries[0].error.as_deref().unwrap().contains("No baseline"));
    assert!(entries[1].is_ok());
}

// ============================================================================
// SQLite-backed Run
// ============================================================================

#[tokio::test]
async fn test_local_storage_matches_memory() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(LocalStorageConfig::with_path(dir.path().join("screener.db")))
        .unwrap();

    let profiles = mixed_market();
    let (baselines, snapshots): (Vec<_>, Vec<_>) = profiles.iter().map(Profile::records).unzip();
    storage.save_baseline(&baselines).await.unwrap();
    storage.store_snapshot(&snapshots).await.unwrap();
    let x = &profiles[0];
    storage.store_bars(&healthy_bars("X.SH", x.close())).await.unwrap();
    assert_eq!(
        storage.get_intraday_bars("X.SH", target()).await.unwrap().len(),
        16
    );

    let config = ScreenerConfig {
        intraday_enabled: true,
        ..Default::default()
    };
    let sqlite_result = ScreenerEngine::new(&config, Arc::new(storage))
        .unwrap()
        .run(target(), baseline_date())
        .await
        .unwrap();

    let memory = Arc::new(MemoryMarketData::new());
    seed(&memory, &profiles).await;
    memory.insert_bars("X.SH", healthy_bars("X.SH", x.close())).await;
    let memory_result = engine_with(memory, 1, true)
        .run(target(), baseline_date())
        .await
        .unwrap();

    assert_eq!(sqlite_result.selection, memory_result.selection);
    assert_eq!(sqlite_result.selection.symbols(), vec!["X.SH"]);
}
