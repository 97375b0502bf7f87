//! Residual standard deviations by period and possession-start type.
//!
//! Static configuration supplied at process start; the engine never
//! calibrates these from data. The populated defaults are estimates pending
//! empirical calibration, kept as an injectable table (not hard-coded
//! branches) so replacing them never touches the statistical engine.

use crate::models::PossStartType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Last-resort σ when a period map carries no usable entry at all.
pub const FALLBACK_STD_DEV: f64 = 8.5;

/// Population standard deviation (seconds) of the residual per
/// `(period, start type)` stratum.
///
/// Lookup falls back to the `rebound` entry for the same period when the
/// type is unrecognized or missing from the map; there is no cross-period
/// fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdDevTable {
    pub period_1: HashMap<PossStartType, f64>,
    pub period_2: HashMap<PossStartType, f64>,
}

impl Default for StdDevTable {
    fn default() -> Self {
        // Estimated values, to be replaced with calibrated ones.
        let estimates = [
            (PossStartType::Rebound, 8.5),
            (PossStartType::Turnover, 8.5),
            (PossStartType::OppoMadeShot, 10.0),
            (PossStartType::OppoMadeFt, 9.0),
        ];
        Self {
            period_1: estimates.iter().copied().collect(),
            period_2: estimates.iter().copied().collect(),
        }
    }
}

impl StdDevTable {
    /// σ for a stratum. Periods other than 1 use the period-2 map (the
    /// second scoring period absorbs overtime).
    pub fn std_dev(&self, period: u32, bucket: PossStartType) -> f64 {
        let map = if period == 1 { &self.period_1 } else { &self.period_2 };
        map.get(&bucket)
            .or_else(|| map.get(&PossStartType::Rebound))
            .copied()
            .unwrap_or(FALLBACK_STD_DEV)
    }
}
