use statrs::distribution::{ContinuousCDF, Normal};

use crate::types::QUANTILE_LEVELS;

/// Moments of a sample. `sd` uses the `n - 1` denominator; skewness and
/// kurtosis are the method-of-moments averages of the standardised values
/// using that `sd`, kurtosis reported as excess over 3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub sd: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let mut mean = 0.0;
    for (i, x) in data.iter().enumerate() {
        mean += (x - mean) / (i + 1) as f64;
    }
    mean
}

pub fn sd_with_mean(data: &[f64], mean: f64) -> f64 {
    let n = data.len();
    if n < 2 {
        return f64::NAN;
    }
    let sum_sq: f64 = data.iter().map(|x| (x - mean) * (x - mean)).sum();
    (sum_sq / (n - 1) as f64).sqrt()
}

pub fn moments(data: &[f64]) -> Moments {
    let mean = mean(data);
    let sd = sd_with_mean(data, mean);
    let (skewness, kurtosis) = standardized_moments(data, mean, sd);
    Moments {
        mean,
        sd,
        skewness,
        kurtosis,
    }
}

fn standardized_moments(data: &[f64], mean: f64, sd: f64) -> (f64, f64) {
    if data.len() < 2 || !sd.is_finite() {
        return (f64::NAN, f64::NAN);
    }
    let mut skew = 0.0;
    let mut kurt = 0.0;
    for (i, x) in data.iter().enumerate() {
        let z = (x - mean) / sd;
        let z2 = z * z;
        skew += (z2 * z - skew) / (i + 1) as f64;
        kurt += (z2 * z2 - kurt) / (i + 1) as f64;
    }
    (skew, kurt - 3.0)
}

/// Type-7 quantile of sorted data (linear interpolation between order statistics).
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let h = (n - 1) as f64 * p;
    let lower = h.floor();
    let i = lower as usize;
    let delta = h - lower;
    if i + 1 < n {
        (1.0 - delta) * sorted[i] + delta * sorted[i + 1]
    } else {
        sorted[i.min(n - 1)]
    }
}

pub fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let half = n / 2;
    if n % 2 == 0 {
        (sorted[half - 1] + sorted[half]) / 2.0
    } else {
        sorted[half]
    }
}

pub fn fixed_quantiles(sorted: &[f64]) -> [(f64, f64); 9] {
    QUANTILE_LEVELS.map(|p| (p, quantile_sorted(sorted, p)))
}

pub fn sort_samples(data: &mut [f64]) {
    data.sort_unstable_by(|a, b| a.total_cmp(b));
}

fn standard_normal() -> Option<Normal> {
    Normal::new(0.0, 1.0).ok()
}

/// Upper-tail probability of a one-degree-of-freedom chi-square statistic,
/// computed as the two-sided normal tail of `sqrt(statistic)`.
pub fn chi_square_upper_tail(statistic: f64) -> f64 {
    if statistic.is_nan() {
        return f64::NAN;
    }
    if statistic <= 0.0 {
        return 1.0;
    }
    if statistic.is_infinite() {
        return 0.0;
    }
    standard_normal().map_or(f64::NAN, |normal| 2.0 * normal.sf(statistic.sqrt()))
}

/// Statistic whose upper-tail probability is `p`: `z^2` with `z` the normal
/// quantile at `p/2` (equal in magnitude to the one at `1 - p/2`).
pub fn chi_square_upper_quantile(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::INFINITY;
    }
    if p == 1.0 {
        return 0.0;
    }
    standard_normal().map_or(f64::NAN, |normal| normal.inverse_cdf(p / 2.0).powi(2))
}

/// Genomic inflation factor of a set of p-values.
pub fn inflation_factor(p_values: &[f64]) -> f64 {
    if p_values.is_empty() {
        return f64::NAN;
    }
    let mut statistics: Vec<f64> = p_values
        .iter()
        .filter(|p| !p.is_nan())
        .map(|&p| chi_square_upper_quantile(p))
        .collect();
    sort_samples(&mut statistics);
    median_sorted(&statistics) / chi_square_upper_quantile(0.5)
}
