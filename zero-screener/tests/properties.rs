//! Property tests for the pure pipeline stages.

use proptest::prelude::*;

use zero_screener::screener::{
    percentile_ranks, sort_candidates, Candidate, ChipTier, ChipTierClassifier, CompositeScorer,
    FeatureRow, FunnelFilter, Regime, RegimeProfile, Selector,
};

// ============================================================================
// Strategies
// ============================================================================

fn regime() -> impl Strategy<Value = Regime> {
    prop_oneof![Just(Regime::Bear), Just(Regime::Sideways), Just(Regime::Bull)]
}

prop_compose! {
    fn feature_row(index: usize)(
        pct_chg in -3.0f64..10.0,
        bias in -0.01f64..0.06,
        high_close_dist in 0.0f64..0.01,
        ats_ratio in 0.5f64..3.0,
        turnover_rate in 0.1f64..25.0,
        winner_rate in 0.0f64..100.0,
        concentration in proptest::option::of(0.0f64..0.3),
    ) -> FeatureRow {
        FeatureRow {
            symbol: format!("{:06}.SZ", index),
            close: 10.0,
            high: 10.0 * (1.0 + high_close_dist),
            volume_lots: 10_000.0,
            amount: 10_000_000.0,
            vwap: 10.0 / (1.0 + bias),
            turnover_rate,
            bias,
            pct_chg,
            ats: 20_000.0,
            ats_ratio,
            efficiency: pct_chg / (turnover_rate + 0.001),
            high_close_dist,
            close_to_high: 1.0 / (1.0 + high_close_dist),
            vol_ratio: 1.0,
            float_mv: Some(100e8),
            bid_ask_imbalance: Some(1.0),
            winner_rate,
            cost_concentration: concentration,
            sum_inst_net: None,
            list_count: None,
            margin_cap_ratio: None,
        }
    }
}

fn feature_rows(max: usize) -> impl Strategy<Value = Vec<FeatureRow>> {
    (0..max).prop_flat_map(|n| (0..n).map(feature_row).collect::<Vec<_>>())
}

fn scored(rows: Vec<FeatureRow>, regime: Regime) -> Vec<Candidate> {
    let profile = RegimeProfile::for_regime(regime);
    let (mut candidates, _) = ChipTierClassifier::new(&profile).apply(rows);
    CompositeScorer::from_profile(&profile).score(&mut candidates);
    candidates
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn percentile_ranks_in_unit_interval(values in prop::collection::vec(-1e6f64..1e6, 1..60)) {
        let ranks = percentile_ranks(&values);
        prop_assert_eq!(ranks.len(), values.len());
        for r in &ranks {
            prop_assert!(*r > 0.0 && *r <= 1.0);
        }
        // the maximum always ranks at 1.0 unless tied
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let ties = values.iter().filter(|v| **v == max).count();
        if ties == 1 {
            let i = values.iter().position(|v| *v == max).unwrap();
            prop_assert_eq!(ranks[i], 1.0);
        }
    }

    #[test]
    fn scores_bounded(rows in feature_rows(40), regime in regime()) {
        let profile = RegimeProfile::for_regime(regime);
        let upper = profile.score_weight_efficiency
            + profile.score_weight_winner_rate
            + profile.score_weight_ats_ratio;
        for c in scored(rows, regime) {
            prop_assert!(c.score > 0.0);
            prop_assert!(c.score <= upper + 1e-9);
        }
    }

    #[test]
    fn tier1_takes_precedence(
        winner_rate in 0.0f64..100.0,
        concentration in proptest::option::of(0.0f64..0.3),
        regime in regime(),
    ) {
        let profile = RegimeProfile::for_regime(regime);
        let tier = ChipTierClassifier::new(&profile).classify(winner_rate, concentration);

        if winner_rate > profile.chip_tier1_winner_rate {
            prop_assert_eq!(tier, ChipTier::Tier1);
        } else if tier == ChipTier::Tier2 {
            prop_assert!(winner_rate > profile.chip_tier2_winner_rate);
            prop_assert!(concentration.is_some_and(|c| c < profile.chip_tier2_concentration));
        }
    }

    #[test]
    fn sorted_by_tier_then_score(rows in feature_rows(40), regime in regime()) {
        let mut candidates = scored(rows, regime);
        sort_candidates(&mut candidates);

        for pair in candidates.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.tier <= b.tier);
            if a.tier == b.tier {
                prop_assert!(a.score >= b.score);
                if a.score == b.score {
                    prop_assert!(a.symbol() < b.symbol());
                }
            }
        }
    }

    #[test]
    fn tightening_funnel_never_adds_rows(
        rows in feature_rows(40),
        regime in regime(),
        cut in 0.0f64..3.0,
    ) {
        let loose = RegimeProfile::for_regime(regime);
        let mut tight = loose;
        tight.pct_chg_max -= cut;

        let (kept_loose, _) = FunnelFilter::new(loose).apply(rows.clone());
        let (kept_tight, _) = FunnelFilter::new(tight).apply(rows);

        prop_assert!(kept_tight.len() <= kept_loose.len());
        for row in &kept_tight {
            prop_assert!(kept_loose.iter().any(|r| r.symbol == row.symbol));
        }
    }

    #[test]
    fn selection_respects_quorum_and_size(
        rows in feature_rows(40),
        regime in regime(),
        output_size in 1usize..12,
        quorum in 1usize..8,
    ) {
        let candidates = scored(rows, regime);
        let selection = Selector::new(15, output_size, quorum).select(&candidates);

        prop_assert!(selection.len() <= output_size);
        prop_assert_eq!(selection.tier1_only, selection.tier1_count >= quorum);
        if selection.tier1_only {
            prop_assert!(selection.candidates.iter().all(|c| c.tier == ChipTier::Tier1));
        }
    }

    #[test]
    fn pure_stages_deterministic(rows in feature_rows(30), regime in regime()) {
        let profile = RegimeProfile::for_regime(regime);
        let selector = Selector::new(profile.top_n_candidates, profile.top_n_output, 5);

        let run = |rows: Vec<FeatureRow>| {
            let (rows, _) = FunnelFilter::new(profile).apply(rows);
            let candidates = scored(rows, regime);
            (selector.rank(&candidates), selector.select(&candidates))
        };

        let first = run(rows.clone());
        let second = run(rows);
        prop_assert_eq!(first.0, second.0);
        prop_assert_eq!(first.1, second.1);
    }
}
