//! Tempo regime-shift detection on the raw observed TFS series.
//!
//! Windowed mean-shift test: slide a split point through the series and
//! compare the mean of the trailing window against the leading window with a
//! two-sample z statistic. Splits whose |z| clears the threshold are change
//! point candidates; candidates within one window of a stronger candidate
//! are suppressed so each regime break yields a single index.
//!
//! Detection is a function of the sequence values only, deterministic, and
//! for annotation purposes only — it never feeds the significance pipeline.

/// Score assigned when both windows are (near-)constant but their means
/// differ: an unambiguous break with no sampling noise to scale by.
const DEGENERATE_SHIFT_SCORE: f64 = 1.0e9;

const EPS: f64 = 1.0e-12;

#[derive(Debug, Clone)]
pub struct ChangePointDetector {
    /// Width of each comparison window, in possessions.
    pub window: usize,
    /// Minimum |z| for a split to count as a regime break.
    pub threshold: f64,
}

impl Default for ChangePointDetector {
    fn default() -> Self {
        Self {
            window: 8,
            threshold: 3.0,
        }
    }
}

impl ChangePointDetector {
    pub fn new(window: usize, threshold: f64) -> Self {
        Self { window, threshold }
    }

    /// Shortest series that can support any change-point claim.
    pub fn min_series_len(&self) -> usize {
        self.window * 2
    }

    /// Indices into `values` where the tempo regime shifts, ascending.
    /// Series shorter than the minimum viable window yield no points.
    pub fn detect(&self, values: &[f64]) -> Vec<usize> {
        let w = self.window;
        if w == 0 || values.len() < self.min_series_len() {
            return Vec::new();
        }

        // Candidate (index, score) at every valid split.
        let mut candidates: Vec<(usize, f64)> = Vec::new();
        for i in w..=values.len() - w {
            let score = self.split_score(&values[i - w..i], &values[i..i + w]);
            if score >= self.threshold {
                candidates.push((i, score));
            }
        }

        // Strongest candidate wins; anything within one window of an
        // accepted break is the same break. Ties resolve to the earlier
        // index so detection stays deterministic.
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let mut accepted: Vec<usize> = Vec::new();
        for (idx, _) in candidates {
            if accepted.iter().all(|&a| idx.abs_diff(a) >= w) {
                accepted.push(idx);
            }
        }
        accepted.sort_unstable();
        accepted
    }

    /// |z| of the mean shift between two adjacent windows.
    fn split_score(&self, left: &[f64], right: &[f64]) -> f64 {
        let n = left.len() as f64;
        let (mean_l, var_l) = mean_and_variance(left);
        let (mean_r, var_r) = mean_and_variance(right);
        let shift = (mean_r - mean_l).abs();

        let se = (var_l / n + var_r / n).sqrt();
        if se < EPS {
            // Flat windows: a zero shift is not a break (the constant-series
            // guarantee), a non-zero shift is a clean step.
            if shift < EPS {
                0.0
            } else {
                DEGENERATE_SHIFT_SCORE
            }
        } else {
            shift / se
        }
    }
}

fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var)
}

/// Detect change points with the default detector configuration.
pub fn find_change_points(values: &[f64]) -> Vec<usize> {
    ChangePointDetector::default().detect(values)
}
