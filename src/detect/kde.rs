//! Density-based outlier detection via Gaussian kernel density estimation.

use crate::detect::{detect_within_clusters, OutlierSet};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal};

/// Parameters for density-based detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdeParams {
    /// Kernel bandwidth. `None` derives it from the analyzed array via the
    /// closed-form rule.
    pub bandwidth: Option<f64>,
    /// Rescaled-density cutoff; values below it are flagged (default 1).
    pub threshold: f64,
}

impl Default for KdeParams {
    fn default() -> Self {
        Self {
            bandwidth: None,
            threshold: 1.0,
        }
    }
}

/// Closed-form bandwidth `h = (4σ⁵ / 3n)^(1/5)` from the sample standard
/// deviation and size.
///
/// Returns 0 for constant or sub-2-element input; callers treat that as a
/// degenerate estimate.
pub fn silverman_bandwidth(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let sigma = variance.sqrt();
    (4.0 * sigma.powi(5) / (3.0 * n as f64)).powf(0.2)
}

/// Gaussian kernel density at every point, rescaled so the mean density is
/// 1 (the densities sum to the sample size).
///
/// The bandwidth is always derived from the array passed in, never carried
/// over from a previous computation, so per-partition calls under cluster
/// conditioning each get their own estimate. Returns `None` when the
/// estimate is degenerate (fewer than two points, or zero bandwidth from
/// constant data).
pub fn rescaled_densities(values: &[f64], bandwidth: Option<f64>) -> Option<Vec<f64>> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let h = bandwidth.unwrap_or_else(|| silverman_bandwidth(values));
    if !(h.is_finite() && h > 0.0) {
        return None;
    }

    let kernel = Normal::new(0.0, 1.0).unwrap();
    let scale = 1.0 / (n as f64 * h);
    let raw: Vec<f64> = values
        .iter()
        .map(|&xi| {
            let sum: f64 = values.iter().map(|&xj| kernel.pdf((xi - xj) / h)).sum();
            sum * scale
        })
        .collect();

    let mean_density = raw.iter().sum::<f64>() / n as f64;
    if !(mean_density.is_finite() && mean_density > 0.0) {
        return None;
    }
    Some(raw.iter().map(|d| d / mean_density).collect())
}

/// Flag values whose rescaled kernel density falls below the threshold.
///
/// Degenerate inputs (empty, singleton, constant) produce an empty set.
pub fn detect_kde(values: &[f64], params: &KdeParams) -> OutlierSet {
    match rescaled_densities(values, params.bandwidth) {
        Some(densities) => densities
            .iter()
            .enumerate()
            .filter(|(_, &d)| d < params.threshold)
            .map(|(i, _)| i)
            .collect(),
        None => OutlierSet::new(),
    }
}

/// Density-based detection conditioned on cluster labels.
///
/// The density estimate, bandwidth included, is recomputed independently
/// within each cluster partition; flagged rows are reported by their global
/// entity index.
pub fn detect_kde_by_cluster(
    values: &[f64],
    labels: &[usize],
    params: &KdeParams,
) -> Result<OutlierSet> {
    detect_within_clusters(values, labels, |part| detect_kde(part, params))
}
