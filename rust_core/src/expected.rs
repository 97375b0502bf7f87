//! Baseline expected time-to-first-shot conditioned on market pricing.
//!
//! The engine treats the expected-tempo function as an external dependency
//! surface: anything deterministic and order-preserving in the market total
//! satisfies the contract. `MarketTempoModel` is the default implementation,
//! coefficient-driven so it can be swapped or re-tuned without touching the
//! statistical engine.

use crate::models::PossStartType;

/// Baseline expected TFS for one possession.
///
/// Implementations must be deterministic for identical inputs and monotone
/// in `closing_total`. Omitting `period` yields a period-agnostic game-level
/// baseline. All outputs are non-negative seconds.
pub trait ExpectedTempo: Send + Sync {
    fn expected_seconds(
        &self,
        closing_total: f64,
        start_type: Option<PossStartType>,
        period: Option<u32>,
        score_diff: Option<f64>,
    ) -> f64;
}

impl<T: ExpectedTempo + ?Sized> ExpectedTempo for &T {
    fn expected_seconds(
        &self,
        closing_total: f64,
        start_type: Option<PossStartType>,
        period: Option<u32>,
        score_diff: Option<f64>,
    ) -> f64 {
        (**self).expected_seconds(closing_total, start_type, period, score_diff)
    }
}

/// Market-implied expected tempo.
///
/// Higher totals price a faster game, so the baseline scales inversely with
/// the closing total around an anchor pace. Start-type offsets capture that
/// live-ball starts (rebounds, turnovers) play faster than dead-ball starts
/// (made shots, made free throws); the second half drifts slightly slower,
/// and lopsided scores slow the game further once past a threshold.
#[derive(Debug, Clone)]
pub struct MarketTempoModel {
    /// Reference closing total at which the anchor pace applies.
    pub anchor_total: f64,
    /// Game-level expected TFS at the anchor total, in seconds.
    pub anchor_seconds: f64,
    /// Additive offset for possessions starting from a defensive rebound.
    pub rebound_offset: f64,
    /// Additive offset for possessions starting from an opponent turnover.
    pub turnover_offset: f64,
    /// Additive offset for possessions starting after an opponent made shot.
    pub made_shot_offset: f64,
    /// Additive offset for possessions starting after opponent made FTs.
    pub made_ft_offset: f64,
    /// Seconds added to the baseline in the second period.
    pub period_2_offset: f64,
    /// Absolute score differential beyond which blowout pacing kicks in.
    pub blowout_threshold: f64,
    /// Seconds added per point of differential past the threshold.
    pub blowout_slowdown: f64,
}

impl Default for MarketTempoModel {
    fn default() -> Self {
        Self {
            anchor_total: 145.0,
            anchor_seconds: 16.0,
            rebound_offset: -1.5,
            turnover_offset: -2.5,
            made_shot_offset: 1.0,
            made_ft_offset: 0.5,
            period_2_offset: 0.5,
            blowout_threshold: 10.0,
            blowout_slowdown: 0.15,
        }
    }
}

impl ExpectedTempo for MarketTempoModel {
    fn expected_seconds(
        &self,
        closing_total: f64,
        start_type: Option<PossStartType>,
        period: Option<u32>,
        score_diff: Option<f64>,
    ) -> f64 {
        // Inverse scaling keeps the baseline monotone in the total.
        let total = closing_total.max(1.0);
        let mut expected = self.anchor_seconds * (self.anchor_total / total);

        if let Some(start) = start_type {
            expected += match start {
                PossStartType::Rebound => self.rebound_offset,
                PossStartType::Turnover => self.turnover_offset,
                PossStartType::OppoMadeShot => self.made_shot_offset,
                PossStartType::OppoMadeFt => self.made_ft_offset,
                PossStartType::Other => 0.0,
            };
        }

        if let Some(p) = period {
            if p >= 2 {
                expected += self.period_2_offset;
            }
        }

        if let Some(diff) = score_diff {
            expected += (diff - self.blowout_threshold).max(0.0) * self.blowout_slowdown;
        }

        expected.max(0.0)
    }
}
