//! Directional significance testing and cross-type pooling.
//!
//! The reported p-value is a recalibrated one-sided statistic, not a
//! classical two-sided p: values near 1 mean "statistically slower than
//! expected", values near 0 mean "statistically faster", 0.5 means no
//! detected deviation.

/// Directional p-value for a stratum's mean residual.
///
/// One-sided z-test against a zero-mean null with known population σ:
/// `z = mean / (σ/√n)`, `p = Φ(z)`. A stratum with no observations or zero
/// σ reports exactly 0.5 (no evidence either way).
pub fn directional_p_value(mean_residual: f64, n: usize, std_dev: f64) -> f64 {
    if n == 0 || std_dev == 0.0 {
        return 0.5;
    }
    let se = std_dev / (n as f64).sqrt();
    normal_cdf(mean_residual / se)
}

/// One stratum's contribution to a pooled test: sample size, sample mean,
/// population σ.
#[derive(Debug, Clone, Copy)]
pub struct StratumMoments {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Pooled moments across strata, ready to feed the same significance test.
#[derive(Debug, Clone, Copy)]
pub struct PooledStats {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Inverse-variance-weighted pooling across type strata.
///
/// `pooled_mean = Σ meanᵢ·nᵢ / Σ nᵢ`, `pooled_std = √(Σ σᵢ²·nᵢ / Σ nᵢ)`.
/// Strata with zero observations are excluded from the sums entirely (not
/// treated as zero-variance). Returns `None` when nothing contributes.
pub fn pool_strata<I>(strata: I) -> Option<PooledStats>
where
    I: IntoIterator<Item = StratumMoments>,
{
    let mut total_n = 0usize;
    let mut weighted_mean_sum = 0.0;
    let mut weighted_var_sum = 0.0;

    for s in strata {
        if s.n == 0 {
            continue;
        }
        let n = s.n as f64;
        total_n += s.n;
        weighted_mean_sum += s.mean * n;
        weighted_var_sum += s.std_dev * s.std_dev * n;
    }

    if total_n == 0 {
        return None;
    }
    let n = total_n as f64;
    Some(PooledStats {
        n: total_n,
        mean: weighted_mean_sum / n,
        std_dev: (weighted_var_sum / n).sqrt(),
    })
}

/// Pool the given strata and run the directional test on the result.
/// No contributing strata ⇒ 0.5.
pub fn combined_p_value<I>(strata: I) -> f64
where
    I: IntoIterator<Item = StratumMoments>,
{
    match pool_strata(strata) {
        Some(pooled) => directional_p_value(pooled.mean, pooled.n, pooled.std_dev),
        None => 0.5,
    }
}

/// Standard normal CDF via the error function.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Error function approximation (Abramowitz and Stegun 7.1.26), max absolute
/// error ~1.5e-7.
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf_sanity() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-9);
        assert!((normal_cdf(1.0) - 0.8413).abs() < 1e-3);
        assert!((normal_cdf(-1.96) - 0.025).abs() < 1e-3);
        assert!(normal_cdf(5.0) > 0.999);
        assert!(normal_cdf(-5.0) < 0.001);
    }

    #[test]
    fn test_p_value_in_unit_interval() {
        for &mean in &[-50.0, -3.2, -0.1, 0.0, 0.1, 3.2, 50.0] {
            for &n in &[1usize, 5, 40, 500] {
                for &sd in &[0.5, 8.5, 30.0] {
                    let p = directional_p_value(mean, n, sd);
                    assert!((0.0..=1.0).contains(&p), "p={} out of range", p);
                }
            }
        }
    }

    #[test]
    fn test_no_data_is_exactly_half() {
        assert_eq!(directional_p_value(3.0, 0, 8.5), 0.5);
        assert_eq!(directional_p_value(3.0, 10, 0.0), 0.5);
    }

    #[test]
    fn test_direction_convention() {
        // Positive mean residual = slower than expected = p above 0.5.
        let slow = directional_p_value(4.0, 25, 8.5);
        let fast = directional_p_value(-4.0, 25, 8.5);
        assert!(slow > 0.5, "positive residual should lean slow: {}", slow);
        assert!(fast < 0.5, "negative residual should lean fast: {}", fast);
        // Symmetric magnitudes mirror around 0.5.
        assert!((slow + fast - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pooling_matches_hand_computation() {
        let strata = [
            StratumMoments { n: 10, mean: 2.0, std_dev: 8.5 },
            StratumMoments { n: 30, mean: -1.0, std_dev: 10.0 },
        ];
        let pooled = pool_strata(strata).unwrap();
        assert_eq!(pooled.n, 40);
        assert!((pooled.mean - (2.0 * 10.0 - 1.0 * 30.0) / 40.0).abs() < 1e-12);
        let expected_var = (8.5f64.powi(2) * 10.0 + 10.0f64.powi(2) * 30.0) / 40.0;
        assert!((pooled.std_dev - expected_var.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_pooling_is_associative_in_distribution() {
        let a = StratumMoments { n: 12, mean: 1.5, std_dev: 8.5 };
        let b = StratumMoments { n: 7, mean: -2.0, std_dev: 10.0 };
        let c = StratumMoments { n: 21, mean: 0.5, std_dev: 9.0 };

        let flat = pool_strata([a, b, c]).unwrap();

        let ab = pool_strata([a, b]).unwrap();
        let nested = pool_strata([
            StratumMoments { n: ab.n, mean: ab.mean, std_dev: ab.std_dev },
            c,
        ])
        .unwrap();

        assert_eq!(flat.n, nested.n);
        assert!((flat.mean - nested.mean).abs() < 1e-12);
        assert!((flat.std_dev - nested.std_dev).abs() < 1e-12);
    }

    #[test]
    fn test_empty_strata_excluded_from_pool() {
        let with_empty = pool_strata([
            StratumMoments { n: 0, mean: 99.0, std_dev: 0.0 },
            StratumMoments { n: 15, mean: 1.0, std_dev: 8.5 },
        ])
        .unwrap();
        let without = pool_strata([StratumMoments { n: 15, mean: 1.0, std_dev: 8.5 }]).unwrap();
        assert_eq!(with_empty.n, without.n);
        assert!((with_empty.std_dev - without.std_dev).abs() < 1e-12);
    }

    #[test]
    fn test_combined_p_value_defaults_to_half() {
        assert_eq!(combined_p_value(std::iter::empty()), 0.5);
        assert_eq!(
            combined_p_value([StratumMoments { n: 0, mean: 1.0, std_dev: 8.5 }]),
            0.5
        );
    }
}
