//! Statistical outlier detectors.
//!
//! Three methods share one contract: input is the numeric attribute array
//! (one scalar per entity), output is a set of global entity indices. Each
//! method runs either globally or conditioned on cluster labels, in which
//! case the statistic is recomputed independently within every partition
//! and locally flagged rows are mapped back to their global indices.

mod iqr;
mod kde;
mod mad;

pub use iqr::{detect_iqr, detect_iqr_by_cluster, IqrParams};
pub use kde::{detect_kde, detect_kde_by_cluster, rescaled_densities, silverman_bandwidth, KdeParams};
pub use mad::{detect_mad, detect_mad_by_cluster, MadParams};

use crate::error::{OutlierError, Result};
use std::collections::BTreeSet;

/// A set of global entity indices flagged as outliers.
pub type OutlierSet = BTreeSet<usize>;

/// Value at a percentile (0..=100) of a sorted slice, with linear
/// interpolation between ranks.
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let weight = rank - lo as f64;
        sorted[lo] * (1.0 - weight) + sorted[hi] * weight
    }
}

/// Median of an unsorted slice. Empty input yields 0.
pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Run a per-partition detector under cluster conditioning.
///
/// Partitions `values` by cluster label, applies `detect` to each
/// partition's sub-array, and maps local indices back through the
/// partition's index mapping into one union set. A label array whose length
/// differs from the value array violates the shared index space and is
/// fatal.
pub(crate) fn detect_within_clusters<F>(
    values: &[f64],
    labels: &[usize],
    detect: F,
) -> Result<OutlierSet>
where
    F: Fn(&[f64]) -> OutlierSet,
{
    if labels.len() != values.len() {
        return Err(OutlierError::DimensionMismatch {
            expected: values.len(),
            actual: labels.len(),
        });
    }

    let n_clusters = labels.iter().max().map_or(0, |&m| m + 1);
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_clusters];
    for (i, &label) in labels.iter().enumerate() {
        members[label].push(i);
    }

    let mut flagged = OutlierSet::new();
    for indices in &members {
        let partition: Vec<f64> = indices.iter().map(|&i| values[i]).collect();
        for local in detect(&partition) {
            flagged.insert(indices[local]);
        }
    }
    Ok(flagged)
}
