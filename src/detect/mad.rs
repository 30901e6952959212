//! Deviation-based outlier detection via median absolute deviation.

use crate::detect::{detect_within_clusters, median, OutlierSet};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Parameters for deviation-based detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MadParams {
    /// Deviation multiplier (default 1).
    pub factor: f64,
}

impl Default for MadParams {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

/// Flag values where `|value − median| >= factor · MAD`.
///
/// When the MAD is zero (constant or majority-constant data) the threshold
/// would flag everything, so only values strictly different from the median
/// are flagged; a constant array therefore produces an empty set for any
/// positive factor.
pub fn detect_mad(values: &[f64], params: &MadParams) -> OutlierSet {
    if values.len() < 2 {
        return OutlierSet::new();
    }

    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    let mad = median(&deviations);

    if mad == 0.0 {
        return deviations
            .iter()
            .enumerate()
            .filter(|(_, &d)| d > 0.0)
            .map(|(i, _)| i)
            .collect();
    }

    let threshold = params.factor * mad;
    deviations
        .iter()
        .enumerate()
        .filter(|(_, &d)| d >= threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Deviation-based detection conditioned on cluster labels.
///
/// Median and MAD are recomputed independently within each cluster
/// partition; flagged rows are reported by their global entity index.
pub fn detect_mad_by_cluster(
    values: &[f64],
    labels: &[usize],
    params: &MadParams,
) -> Result<OutlierSet> {
    detect_within_clusters(values, labels, |part| detect_mad(part, params))
}
