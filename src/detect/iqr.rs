//! Range-based outlier detection via the interquartile envelope.

use crate::detect::{detect_within_clusters, percentile, OutlierSet};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Parameters for range-based detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IqrParams {
    /// Upper percentile of the envelope (default 75).
    pub upper: f64,
    /// Lower percentile of the envelope (default 25).
    pub lower: f64,
    /// Envelope width multiplier (default 1.5).
    pub factor: f64,
}

impl Default for IqrParams {
    fn default() -> Self {
        Self {
            upper: 75.0,
            lower: 25.0,
            factor: 1.5,
        }
    }
}

/// Flag values outside `[qLower − k·IQR, qUpper + k·IQR]`.
///
/// Reversed percentile arguments are swapped, never an error. Fewer than
/// two values, or a zero-width envelope over constant data, yield an empty
/// set.
pub fn detect_iqr(values: &[f64], params: &IqrParams) -> OutlierSet {
    if values.len() < 2 {
        return OutlierSet::new();
    }

    let (lower, upper) = if params.lower > params.upper {
        (params.upper, params.lower)
    } else {
        (params.lower, params.upper)
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q_lower = percentile(&sorted, lower);
    let q_upper = percentile(&sorted, upper);
    let margin = params.factor * (q_upper - q_lower);
    let low_bound = q_lower - margin;
    let high_bound = q_upper + margin;

    values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v < low_bound || v > high_bound)
        .map(|(i, _)| i)
        .collect()
}

/// Range-based detection conditioned on cluster labels.
///
/// The percentile envelope is recomputed independently within each cluster
/// partition; flagged rows are reported by their global entity index.
pub fn detect_iqr_by_cluster(
    values: &[f64],
    labels: &[usize],
    params: &IqrParams,
) -> Result<OutlierSet> {
    detect_within_clusters(values, labels, |part| detect_iqr(part, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_extreme_value() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        let flagged = detect_iqr(&values, &IqrParams::default());
        assert_eq!(flagged, OutlierSet::from([5]));
    }

    #[test]
    fn test_argument_order_invariance() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0, -50.0];
        let forward = detect_iqr(
            &values,
            &IqrParams {
                upper: 75.0,
                lower: 25.0,
                factor: 1.5,
            },
        );
        let reversed = detect_iqr(
            &values,
            &IqrParams {
                upper: 25.0,
                lower: 75.0,
                factor: 1.5,
            },
        );
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_constant_data_flags_nothing() {
        let values = [5.0; 20];
        assert!(detect_iqr(&values, &IqrParams::default()).is_empty());
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(detect_iqr(&[], &IqrParams::default()).is_empty());
        assert!(detect_iqr(&[42.0], &IqrParams::default()).is_empty());
    }

    #[test]
    fn test_cluster_conditioned_single_cluster_matches_global() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        let labels = vec![0; values.len()];
        let global = detect_iqr(&values, &IqrParams::default());
        let clustered =
            detect_iqr_by_cluster(&values, &labels, &IqrParams::default()).unwrap();
        assert_eq!(global, clustered);
    }

    #[test]
    fn test_cluster_conditioned_detects_within_partitions() {
        // Two scales: 1000 is ordinary in cluster 1 but the 90 in cluster 0
        // is anomalous there.
        let values = [1.0, 2.0, 3.0, 2.0, 1.5, 90.0, 1000.0, 1100.0, 1050.0, 980.0, 1020.0];
        let labels = [0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
        let flagged = detect_iqr_by_cluster(&values, &labels, &IqrParams::default()).unwrap();
        assert!(flagged.contains(&5));
        assert!(!flagged.contains(&6));
    }
}
