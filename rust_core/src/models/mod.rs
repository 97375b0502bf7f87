// Shared models for the tempo analysis engine and services
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Possession-start types
// ============================================================================

/// The event that began a possession.
///
/// Raw play-by-play feeds carry these as free-form strings; anything absent
/// or unrecognized is normalized to `Other` rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PossStartType {
    Rebound,
    Turnover,
    OppoMadeShot,
    OppoMadeFt,
    Other,
}

impl PossStartType {
    /// Stable iteration order for stratified aggregation and display.
    pub const ALL: [PossStartType; 5] = [
        PossStartType::Rebound,
        PossStartType::Turnover,
        PossStartType::OppoMadeShot,
        PossStartType::OppoMadeFt,
        PossStartType::Other,
    ];

    /// Normalize a raw feed tag into a bucket. Case-insensitive; absent or
    /// unrecognized tags map to `Other`.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("rebound") => PossStartType::Rebound,
            Some("turnover") => PossStartType::Turnover,
            Some("oppo_made_shot") => PossStartType::OppoMadeShot,
            Some("oppo_made_ft") => PossStartType::OppoMadeFt,
            _ => PossStartType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PossStartType::Rebound => "rebound",
            PossStartType::Turnover => "turnover",
            PossStartType::OppoMadeShot => "oppo_made_shot",
            PossStartType::OppoMadeFt => "oppo_made_ft",
            PossStartType::Other => "other",
        }
    }

    /// Short label for report tables.
    pub fn label(&self) -> &'static str {
        match self {
            PossStartType::Rebound => "Rebound",
            PossStartType::Turnover => "Turnover",
            PossStartType::OppoMadeShot => "Made Shot",
            PossStartType::OppoMadeFt => "Made FT",
            PossStartType::Other => "Other",
        }
    }
}

// ============================================================================
// Possession records (upstream input)
// ============================================================================

/// One possession of normalized play-by-play timing data.
///
/// Records for a game form a sequence ordered by `chrono_index` with
/// non-decreasing `period_number`. Immutable once produced by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PossessionRecord {
    /// Strictly increasing possession ordinal within the game.
    pub chrono_index: u32,
    /// Observed seconds from possession start to first shot attempt (TFS).
    pub action_time: f64,
    /// Raw possession-start tag from the feed, if any.
    #[serde(default)]
    pub poss_start_type: Option<String>,
    /// Scoring period, 1-based.
    pub period_number: u32,
    /// Cumulative away score at possession time, when the feed carries it.
    #[serde(default)]
    pub away_score: Option<i32>,
    /// Cumulative home score at possession time, when the feed carries it.
    #[serde(default)]
    pub home_score: Option<i32>,
}

impl PossessionRecord {
    /// Normalized start-type bucket (absent/unknown tags fold into `Other`).
    pub fn start_bucket(&self) -> PossStartType {
        PossStartType::from_tag(self.poss_start_type.as_deref())
    }

    /// Start type to hand to the expected-tempo model: `None` when the feed
    /// carried no tag at all, otherwise the normalized bucket.
    pub fn start_type(&self) -> Option<PossStartType> {
        self.poss_start_type
            .as_deref()
            .map(|t| PossStartType::from_tag(Some(t)))
    }

    /// Absolute score differential at possession time, when both scores are
    /// present.
    pub fn score_diff(&self) -> Option<f64> {
        match (self.away_score, self.home_score) {
            (Some(a), Some(h)) => Some((a as f64 - h as f64).abs()),
            _ => None,
        }
    }

    /// Whether this possession belongs to the second scoring period (period
    /// numbers past 2, e.g. overtime, count toward the second half).
    pub fn is_second_period(&self) -> bool {
        self.period_number >= 2
    }
}

// ============================================================================
// Derived records and aggregates
// ============================================================================

/// Per-possession deviation from the model baseline (ephemeral).
#[derive(Debug, Clone, Copy)]
pub struct ResidualRecord {
    pub possession_index: u32,
    /// Observed TFS minus expected TFS, in seconds.
    pub residual: f64,
    pub period_number: u32,
    pub bucket: PossStartType,
}

/// Summary statistics for one stratum of residuals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AggregateStats {
    pub count: usize,
    /// Mean residual in seconds (0.0 when the stratum is empty).
    pub mean: f64,
    /// Median residual in seconds (0.0 when the stratum is empty).
    pub median: f64,
    /// Percent of residuals strictly above zero (0.0 when empty).
    pub pct_positive: f64,
    /// Directional p-value: near 1 = statistically slower than expected,
    /// near 0 = statistically faster, 0.5 = no evidence either way.
    pub p_value: f64,
}

impl AggregateStats {
    /// Placeholder aggregate for a scope with no observations.
    pub fn empty() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            median: 0.0,
            pct_positive: 0.0,
            p_value: 0.5,
        }
    }
}

/// Directional classification of a stretch of play against the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempoVerdict {
    Faster,
    Slower,
}

impl TempoVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            TempoVerdict::Faster => "faster",
            TempoVerdict::Slower => "slower",
        }
    }
}

/// Full stratified significance result for one game.
///
/// Type maps only contain strata with at least one observation; the
/// per-period aggregates are always present (zero/placeholder when empty).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignificanceReport {
    /// Both periods combined.
    pub overall: AggregateStats,
    pub period_1: AggregateStats,
    pub period_2: AggregateStats,
    /// By start type, both periods combined.
    pub by_type: HashMap<PossStartType, AggregateStats>,
    pub by_type_p1: HashMap<PossStartType, AggregateStats>,
    pub by_type_p2: HashMap<PossStartType, AggregateStats>,
}

impl SignificanceReport {
    /// Canonical ground truth for "did the second half run fast or slow".
    ///
    /// Negative period-2 median residual means the half ran faster than the
    /// baseline; non-negative (including exactly zero) means slower. The tie
    /// classifies as `Slower`, deterministically.
    pub fn second_half_verdict(&self) -> TempoVerdict {
        if self.period_2.median < 0.0 {
            TempoVerdict::Faster
        } else {
            TempoVerdict::Slower
        }
    }
}

// ============================================================================
// Smoothed curves and per-game analysis output
// ============================================================================

/// A continuous trend curve sampled on a fixed evaluation grid.
///
/// Freshly allocated per request; empty input produces an empty curve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmoothedCurve {
    /// Grid positions in possession-index units.
    pub grid: Vec<f64>,
    /// Smoothed values, one per grid position.
    pub values: Vec<f64>,
}

impl SmoothedCurve {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// Iterate `(grid_position, smoothed_value)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.grid.iter().copied().zip(self.values.iter().copied())
    }
}

/// Result of one analysis call for one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoAnalysis {
    pub game_id: String,
    /// Smoothed observed TFS over the period-1 display window.
    pub observed_trend: SmoothedCurve,
    /// Smoothed possession-level expected TFS on the same grid. Empty when
    /// no market total was supplied.
    pub expected_trend: SmoothedCurve,
    /// Indices into the period-1 observed series where the tempo regime
    /// shifts, ascending. Annotation only.
    pub change_points: Vec<usize>,
    /// `None` when no market total was available (a valid, common state) or
    /// when aggregation degraded; trend outputs above are still usable.
    pub significance: Option<SignificanceReport>,
    pub generated_at: DateTime<Utc>,
}

impl TempoAnalysis {
    /// Convenience accessor for the scoring oracle.
    pub fn second_half_verdict(&self) -> Option<TempoVerdict> {
        self.significance.as_ref().map(|s| s.second_half_verdict())
    }
}
