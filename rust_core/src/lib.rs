//! Tempo Core - tempo expectation and residual analysis for basketball
//! play-by-play timing.
//!
//! This crate provides:
//! - Market-implied expected time-to-first-shot baselines per possession
//! - Gaussian-kernel trend smoothing of observed and expected TFS series
//! - Change-point detection on the raw observed tempo series
//! - Possession-level residuals stratified by period and start type
//! - Directional significance (one-sided z-test) with cross-type pooling
//! - The period-2 faster/slower verdict used to score user predictions
//! - Batch processing across games via rayon
//!
//! The engine is purely computational: no I/O, no shared mutable state, and
//! every intermediate is freshly allocated per call. Fetching play-by-play
//! data, pricing lookups, rendering, and artifact caching are collaborator
//! concerns outside this crate.

pub mod change_points;
pub mod engine;
pub mod errors;
pub mod expected;
pub mod models;
pub mod significance;
pub mod smoothing;
pub mod std_devs;

pub use change_points::{find_change_points, ChangePointDetector};
pub use engine::{GameInput, TempoAnalyzer};
pub use errors::EngineError;
pub use expected::{ExpectedTempo, MarketTempoModel};
pub use models::{
    AggregateStats, PossStartType, PossessionRecord, SignificanceReport, SmoothedCurve,
    TempoAnalysis, TempoVerdict,
};
pub use smoothing::{smooth_onto_grid, smooth_series, uniform_grid, DEFAULT_BANDWIDTH};
pub use std_devs::StdDevTable;
