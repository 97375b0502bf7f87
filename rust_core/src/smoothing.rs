//! Gaussian-kernel trend smoothing (Nadaraya-Watson local averaging).
//!
//! Turns a scattered `(x, y)` possession series into a continuous curve on a
//! fixed 200-point grid. Pure and stateless; invoked twice per game, once on
//! observed TFS and once on the expected-TFS series, so the two curves are
//! directly comparable on the same grid.

use crate::models::SmoothedCurve;

/// Grid resolution for the evaluation window.
pub const GRID_POINTS: usize = 200;

/// Default bandwidth in possession-index units.
pub const DEFAULT_BANDWIDTH: f64 = 5.0;

/// Uniform partition of `[min(x), max(x)]` into `GRID_POINTS` points.
/// Empty input yields an empty grid.
pub fn uniform_grid(x: &[f64]) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for &v in x {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    let step = (hi - lo) / (GRID_POINTS - 1) as f64;
    (0..GRID_POINTS).map(|i| lo + step * i as f64).collect()
}

/// Smooth `(x, y)` onto a uniform grid spanning the observed x-range.
pub fn smooth_series(x: &[f64], y: &[f64], bandwidth: f64) -> SmoothedCurve {
    let grid = uniform_grid(x);
    smooth_onto_grid(x, y, bandwidth, &grid)
}

/// Smooth `(x, y)` onto a caller-supplied grid.
///
/// For each grid point `g`: `smoothed(g) = Σ yᵢ·K((g−xᵢ)/h) / Σ K((g−xᵢ)/h)`
/// with `K` the standard Gaussian density (the normalizing constant cancels).
/// Degenerate input (empty series or empty grid) yields an empty curve. A
/// grid point so far from every sample that the kernel mass underflows takes
/// the nearest sample's value instead of producing NaN.
pub fn smooth_onto_grid(x: &[f64], y: &[f64], bandwidth: f64, grid: &[f64]) -> SmoothedCurve {
    debug_assert_eq!(x.len(), y.len());
    if x.is_empty() || y.is_empty() || grid.is_empty() {
        return SmoothedCurve::empty();
    }

    let h = if bandwidth > 0.0 { bandwidth } else { DEFAULT_BANDWIDTH };
    let n = x.len().min(y.len());

    let values = grid
        .iter()
        .map(|&g| {
            let mut num = 0.0;
            let mut den = 0.0;
            for i in 0..n {
                let u = (g - x[i]) / h;
                let w = (-0.5 * u * u).exp();
                num += w * y[i];
                den += w;
            }
            if den > f64::MIN_POSITIVE {
                num / den
            } else {
                nearest_value(x, y, n, g)
            }
        })
        .collect();

    SmoothedCurve {
        grid: grid.to_vec(),
        values,
    }
}

fn nearest_value(x: &[f64], y: &[f64], n: usize, g: f64) -> f64 {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for i in 0..n {
        let d = (x[i] - g).abs();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    y[best]
}
