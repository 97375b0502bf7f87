//! Residual & significance engine.
//!
//! Orchestrates the other components for one game: per-possession residuals
//! against the expected-tempo baseline, stratified aggregation by period and
//! possession-start type, directional p-values with cross-type pooling, the
//! two smoothed trend curves over the period-1 display window, and change
//! points on the raw observed series.
//!
//! Every analysis is a self-contained transformation of its inputs: all
//! intermediates are freshly allocated per call and nothing is shared across
//! invocations, so batches parallelize with no coordination.

use crate::change_points::ChangePointDetector;
use crate::errors::EngineError;
use crate::expected::{ExpectedTempo, MarketTempoModel};
use crate::models::{
    AggregateStats, PossStartType, PossessionRecord, ResidualRecord, SignificanceReport,
    SmoothedCurve, TempoAnalysis,
};
use crate::significance::{combined_p_value, directional_p_value, StratumMoments};
use crate::smoothing::{self, DEFAULT_BANDWIDTH};
use crate::std_devs::StdDevTable;
use chrono::Utc;
use log::error;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One game's worth of input for batch analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInput {
    pub game_id: String,
    /// Market closing total, when the pricing lookup had one. Absence is a
    /// valid, common state: trends still render, significance does not run.
    #[serde(default)]
    pub closing_total: Option<f64>,
    pub possessions: Vec<PossessionRecord>,
}

/// Per-game tempo analyzer.
///
/// Owns the expected-tempo model, the residual σ table, the smoother
/// bandwidth, and the change-point detector. Analysis calls are pure with
/// respect to the analyzer's configuration, so one analyzer serves any
/// number of games, sequentially or in parallel.
pub struct TempoAnalyzer<M: ExpectedTempo = MarketTempoModel> {
    model: M,
    std_devs: StdDevTable,
    bandwidth: f64,
    detector: ChangePointDetector,
}

impl TempoAnalyzer<MarketTempoModel> {
    /// Default model, placeholder σ table, bandwidth 5, default detector.
    pub fn with_defaults() -> Self {
        Self::new(MarketTempoModel::default())
    }
}

impl<M: ExpectedTempo> TempoAnalyzer<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            std_devs: StdDevTable::default(),
            bandwidth: DEFAULT_BANDWIDTH,
            detector: ChangePointDetector::default(),
        }
    }

    pub fn with_std_devs(mut self, std_devs: StdDevTable) -> Self {
        self.std_devs = std_devs;
        self
    }

    pub fn with_bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    pub fn with_detector(mut self, detector: ChangePointDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Analyze one game.
    ///
    /// `records` must be ordered by `chrono_index`. The smoothed curves and
    /// change points cover the period-1 display window; the significance
    /// report covers the full game. Missing inputs (no market total, empty
    /// sequence, no period-1 data) degrade to reduced-capability results,
    /// never errors.
    pub fn analyze(
        &self,
        game_id: &str,
        records: &[PossessionRecord],
        closing_total: Option<f64>,
    ) -> TempoAnalysis {
        let display: Vec<&PossessionRecord> = records
            .iter()
            .filter(|r| !r.is_second_period())
            .collect();
        let x: Vec<f64> = display.iter().map(|r| r.chrono_index as f64).collect();
        let y: Vec<f64> = display.iter().map(|r| r.action_time).collect();

        let grid = smoothing::uniform_grid(&x);
        let observed_trend = smoothing::smooth_onto_grid(&x, &y, self.bandwidth, &grid);
        let change_points = self.detector.detect(&y);

        // Baseline trend on the same grid, so the two curves difference
        // cleanly into faster/slower sub-regions.
        let expected_trend = match closing_total {
            Some(total) if !display.is_empty() => {
                let diff_p1 = period_score_diff(records, false);
                let expected: Vec<f64> = display
                    .iter()
                    .map(|r| {
                        self.model
                            .expected_seconds(total, r.start_type(), Some(1), diff_p1)
                    })
                    .collect();
                smoothing::smooth_onto_grid(&x, &expected, self.bandwidth, &grid)
            }
            _ => SmoothedCurve::empty(),
        };

        let significance = match closing_total {
            Some(total) if !records.is_empty() => {
                match self.compute_significance(records, total) {
                    Ok(report) => Some(report),
                    Err(err) => {
                        // Internal faults degrade to "no residual layer";
                        // the trend outputs above remain usable.
                        error!("significance degraded for game {}: {}", game_id, err);
                        None
                    }
                }
            }
            _ => None,
        };

        TempoAnalysis {
            game_id: game_id.to_string(),
            observed_trend,
            expected_trend,
            change_points,
            significance,
            generated_at: Utc::now(),
        }
    }

    /// Analyze many games in parallel. Equivalent to mapping `analyze` over
    /// the slice; every component is a pure function of its arguments.
    pub fn analyze_batch(&self, games: &[GameInput]) -> Vec<TempoAnalysis> {
        games
            .par_iter()
            .map(|g| self.analyze(&g.game_id, &g.possessions, g.closing_total))
            .collect()
    }

    fn compute_significance(
        &self,
        records: &[PossessionRecord],
        closing_total: f64,
    ) -> Result<SignificanceReport, EngineError> {
        let diff_p1 = period_score_diff(records, false);
        let diff_p2 = period_score_diff(records, true);

        let residuals: Vec<ResidualRecord> = records
            .iter()
            .map(|r| {
                let diff = if r.is_second_period() { diff_p2 } else { diff_p1 };
                let expected = self.model.expected_seconds(
                    closing_total,
                    r.start_type(),
                    Some(r.period_number),
                    diff,
                );
                ResidualRecord {
                    possession_index: r.chrono_index,
                    residual: r.action_time - expected,
                    period_number: r.period_number,
                    bucket: r.start_bucket(),
                }
            })
            .collect();

        let mut p1_by_type: HashMap<PossStartType, Vec<f64>> = HashMap::new();
        let mut p2_by_type: HashMap<PossStartType, Vec<f64>> = HashMap::new();
        for r in &residuals {
            let map = if r.period_number >= 2 {
                &mut p2_by_type
            } else {
                &mut p1_by_type
            };
            map.entry(r.bucket).or_default().push(r.residual);
        }

        let mut game_by_type: HashMap<PossStartType, Vec<f64>> = HashMap::new();
        for bucket in PossStartType::ALL {
            let mut all = Vec::new();
            if let Some(v) = p1_by_type.get(&bucket) {
                all.extend_from_slice(v);
            }
            if let Some(v) = p2_by_type.get(&bucket) {
                all.extend_from_slice(v);
            }
            if !all.is_empty() {
                game_by_type.insert(bucket, all);
            }
        }

        // Per-type aggregates; the cross-period table uses period-1 σs.
        let by_type_p1 = self.type_aggregates(&p1_by_type, 1, "period 1 by-type")?;
        let by_type_p2 = self.type_aggregates(&p2_by_type, 2, "period 2 by-type")?;
        let by_type = self.type_aggregates(&game_by_type, 1, "game by-type")?;

        let period_1 = self.period_aggregate(&p1_by_type, 1, "period 1")?;
        let period_2 = self.period_aggregate(&p2_by_type, 2, "period 2")?;
        let overall = self.period_aggregate(&game_by_type, 1, "overall")?;

        Ok(SignificanceReport {
            overall,
            period_1,
            period_2,
            by_type,
            by_type_p1,
            by_type_p2,
        })
    }

    /// One aggregate per start type with at least one observation; the
    /// per-stratum z-test uses that stratum's σ directly.
    fn type_aggregates(
        &self,
        by_type: &HashMap<PossStartType, Vec<f64>>,
        sigma_period: u32,
        scope: &'static str,
    ) -> Result<HashMap<PossStartType, AggregateStats>, EngineError> {
        let mut out = HashMap::new();
        for (&bucket, values) in by_type {
            if values.is_empty() {
                continue;
            }
            let sigma = self.std_devs.std_dev(sigma_period, bucket);
            let p_value = directional_p_value(mean(values), values.len(), sigma);
            out.insert(bucket, validated(basic_aggregate(values, p_value), scope)?);
        }
        Ok(out)
    }

    /// Period-level aggregate: plain stats over all residuals in the scope,
    /// p-value from inverse-variance pooling over its type strata. Empty
    /// scopes report the zero/placeholder aggregate.
    fn period_aggregate(
        &self,
        by_type: &HashMap<PossStartType, Vec<f64>>,
        sigma_period: u32,
        scope: &'static str,
    ) -> Result<AggregateStats, EngineError> {
        let all: Vec<f64> = by_type.values().flatten().copied().collect();
        if all.is_empty() {
            return Ok(AggregateStats::empty());
        }

        let p_value = combined_p_value(by_type.iter().filter(|(_, v)| !v.is_empty()).map(
            |(&bucket, values)| StratumMoments {
                n: values.len(),
                mean: mean(values),
                std_dev: self.std_devs.std_dev(sigma_period, bucket),
            },
        ));

        validated(basic_aggregate(&all, p_value), scope)
    }
}

/// Max absolute score differential over one period's possessions, `None`
/// when no possession in that period carries both scores.
fn period_score_diff(records: &[PossessionRecord], second_period: bool) -> Option<f64> {
    records
        .iter()
        .filter(|r| r.is_second_period() == second_period)
        .filter_map(|r| r.score_diff())
        .fold(None, |acc, d| Some(acc.map_or(d, |m: f64| m.max(d))))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn pct_positive(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let above = values.iter().filter(|&&v| v > 0.0).count();
    above as f64 / values.len() as f64 * 100.0
}

fn basic_aggregate(values: &[f64], p_value: f64) -> AggregateStats {
    AggregateStats {
        count: values.len(),
        mean: mean(values),
        median: median(values),
        pct_positive: pct_positive(values),
        p_value,
    }
}

/// Guard the engine boundary: degenerate floating-point results become
/// errors here instead of leaking into persisted reports.
fn validated(stats: AggregateStats, scope: &'static str) -> Result<AggregateStats, EngineError> {
    for (stat, value) in [
        ("mean", stats.mean),
        ("median", stats.median),
        ("pct_positive", stats.pct_positive),
    ] {
        if !value.is_finite() {
            return Err(EngineError::NonFiniteStatistic { scope, stat });
        }
    }
    if !stats.p_value.is_finite() || !(0.0..=1.0).contains(&stats.p_value) {
        return Err(EngineError::PValueOutOfRange {
            scope,
            value: stats.p_value,
        });
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TempoVerdict;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Baseline that ignores all context; pins expected TFS for scenarios.
    struct FlatTempo(f64);

    impl ExpectedTempo for FlatTempo {
        fn expected_seconds(
            &self,
            _closing_total: f64,
            _start_type: Option<PossStartType>,
            _period: Option<u32>,
            _score_diff: Option<f64>,
        ) -> f64 {
            self.0
        }
    }

    fn possession(
        index: u32,
        tfs: f64,
        start: &str,
        period: u32,
    ) -> PossessionRecord {
        PossessionRecord {
            chrono_index: index,
            action_time: tfs,
            poss_start_type: Some(start.to_string()),
            period_number: period,
            away_score: None,
            home_score: None,
        }
    }

    fn scenario_records() -> Vec<PossessionRecord> {
        vec![
            possession(1, 12.0, "rebound", 1),
            possession(2, 9.0, "turnover", 1),
            possession(3, 14.0, "rebound", 2),
            possession(4, 6.0, "turnover", 2),
        ]
    }

    #[test]
    fn test_boundary_scenario_ties_classify_slow() {
        // Expected pinned at 10s for every possession; σ 8.5 for both types.
        let analyzer = TempoAnalyzer::new(FlatTempo(10.0));
        let analysis = analyzer.analyze("g1", &scenario_records(), Some(145.0));

        let report = analysis.significance.expect("market total present");

        // Period 2 residuals are [+4, -4]: zero median, zero mean.
        assert_eq!(report.period_2.count, 2);
        assert!((report.period_2.mean - 0.0).abs() < 1e-12);
        assert!((report.period_2.median - 0.0).abs() < 1e-12);
        // Pooled σ stays 8.5, z ≈ 0 → no signal either way.
        assert!((report.period_2.p_value - 0.5).abs() < 1e-6);
        // The tie must classify as slower, deterministically.
        assert_eq!(report.second_half_verdict(), TempoVerdict::Slower);

        // Period 1 residuals are [+2, -1].
        assert_eq!(report.period_1.count, 2);
        assert!((report.period_1.mean - 0.5).abs() < 1e-12);
        assert!((report.period_1.pct_positive - 50.0).abs() < 1e-12);

        // Overall: sorted residuals [-4, -1, +2, +4].
        assert_eq!(report.overall.count, 4);
        assert!((report.overall.median - 0.5).abs() < 1e-12);
        assert!((report.overall.pct_positive - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_pct_positive_complement_sums_to_100() {
        let analyzer = TempoAnalyzer::new(FlatTempo(10.0));
        let analysis = analyzer.analyze("g1", &scenario_records(), Some(145.0));
        let report = analysis.significance.unwrap();

        for stats in [report.overall, report.period_1, report.period_2] {
            let pct = stats.pct_positive;
            assert!((0.0..=100.0).contains(&pct));
            assert!((pct + (100.0 - pct) - 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_no_market_total_yields_trend_only() {
        let analyzer = TempoAnalyzer::with_defaults();
        let analysis = analyzer.analyze("g2", &scenario_records(), None);

        assert!(analysis.significance.is_none());
        assert!(analysis.expected_trend.is_empty());
        assert!(!analysis.observed_trend.is_empty());
        assert_eq!(analysis.second_half_verdict(), None);
    }

    #[test]
    fn test_empty_sequence_is_a_valid_state() {
        let analyzer = TempoAnalyzer::with_defaults();
        let analysis = analyzer.analyze("g3", &[], Some(140.0));

        assert!(analysis.observed_trend.is_empty());
        assert!(analysis.expected_trend.is_empty());
        assert!(analysis.change_points.is_empty());
        assert!(analysis.significance.is_none());
    }

    #[test]
    fn test_no_period_1_data_still_scores_the_game() {
        let records = vec![
            possession(10, 14.0, "rebound", 2),
            possession(11, 6.0, "turnover", 2),
        ];
        let analyzer = TempoAnalyzer::new(FlatTempo(10.0));
        let analysis = analyzer.analyze("g4", &records, Some(150.0));

        // No display window, but the full-game significance still runs.
        assert!(analysis.observed_trend.is_empty());
        assert!(analysis.change_points.is_empty());
        let report = analysis.significance.expect("P2-only game still scores");
        assert_eq!(report.period_1.count, 0);
        assert_eq!(report.period_1.p_value, 0.5);
        assert_eq!(report.period_2.count, 2);
    }

    #[test]
    fn test_removing_last_of_a_type_drops_only_that_entry() {
        let mut records = scenario_records();
        records.push(possession(5, 20.0, "oppo_made_ft", 1));

        let analyzer = TempoAnalyzer::new(FlatTempo(10.0));
        let with_ft = analyzer
            .analyze("g5", &records, Some(145.0))
            .significance
            .unwrap();
        assert!(with_ft.by_type_p1.contains_key(&PossStartType::OppoMadeFt));

        records.pop();
        let without_ft = analyzer
            .analyze("g5", &records, Some(145.0))
            .significance
            .unwrap();
        assert!(!without_ft.by_type_p1.contains_key(&PossStartType::OppoMadeFt));

        // Sibling period aggregates are untouched.
        assert_eq!(
            with_ft.by_type_p2.len(),
            without_ft.by_type_p2.len()
        );
        assert_eq!(with_ft.period_2.count, without_ft.period_2.count);
        assert!((with_ft.period_2.p_value - without_ft.period_2.p_value).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_tags_bucket_as_other() {
        let mut records = scenario_records();
        records.push(PossessionRecord {
            chrono_index: 5,
            action_time: 11.0,
            poss_start_type: Some("halfcourt_set".to_string()),
            period_number: 1,
            away_score: None,
            home_score: None,
        });

        let analyzer = TempoAnalyzer::new(FlatTempo(10.0));
        let report = analyzer
            .analyze("g6", &records, Some(145.0))
            .significance
            .unwrap();
        assert_eq!(report.by_type_p1[&PossStartType::Other].count, 1);
    }

    #[test]
    fn test_period_score_diff_max_within_period() {
        let mut records = scenario_records();
        records[0].away_score = Some(10);
        records[0].home_score = Some(20);
        records[1].away_score = Some(30);
        records[1].home_score = Some(31);

        assert_eq!(period_score_diff(&records, false), Some(10.0));
        // No period-2 possession carries both scores.
        assert_eq!(period_score_diff(&records, true), None);
    }

    #[test]
    fn test_degenerate_input_degrades_to_no_significance() {
        let mut records = scenario_records();
        records[2].action_time = f64::NAN;

        let analyzer = TempoAnalyzer::new(FlatTempo(10.0));
        let analysis = analyzer.analyze("g7", &records, Some(145.0));
        // Aggregation fault is caught at the boundary, not propagated.
        assert!(analysis.significance.is_none());
    }

    #[test]
    fn test_batch_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(42);
        let tags = ["rebound", "turnover", "oppo_made_shot", "oppo_made_ft"];

        let games: Vec<GameInput> = (0..6)
            .map(|g| {
                let possessions: Vec<PossessionRecord> = (0..60)
                    .map(|i| {
                        let period = if i < 30 { 1 } else { 2 };
                        possession(
                            i + 1,
                            6.0 + rng.gen_range(0.0..20.0),
                            tags[rng.gen_range(0..tags.len())],
                            period,
                        )
                    })
                    .collect();
                GameInput {
                    game_id: format!("game-{}", g),
                    closing_total: if g % 3 == 0 { None } else { Some(140.0 + g as f64) },
                    possessions,
                }
            })
            .collect();

        let analyzer = TempoAnalyzer::with_defaults();
        let batch = analyzer.analyze_batch(&games);
        assert_eq!(batch.len(), games.len());

        for (result, game) in batch.iter().zip(&games) {
            let solo = analyzer.analyze(&game.game_id, &game.possessions, game.closing_total);
            assert_eq!(result.game_id, solo.game_id);
            assert_eq!(result.observed_trend.values, solo.observed_trend.values);
            assert_eq!(result.change_points, solo.change_points);
            match (&result.significance, &solo.significance) {
                (Some(a), Some(b)) => {
                    assert_eq!(a.overall.count, b.overall.count);
                    assert!((a.period_2.p_value - b.period_2.p_value).abs() < 1e-12);
                }
                (None, None) => {}
                _ => panic!("batch and sequential disagree on significance presence"),
            }
        }
    }
}
