//! Statistical outlier detection for typed entity datasets.
//!
//! This library flags anomalous entities (e.g. administrative regions or
//! organizations) in a numeric attribute dataset such as population counts.
//! Detection can run globally over the whole dataset, or conditioned on
//! unsupervised clusters derived from the entities' categorical type tags.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Parallel entity/value tables (AttributeTable)
//! - **feature**: Binary type-membership feature extraction with frequency
//!   pruning (TagVocabulary, TypeMatrix)
//! - **cluster**: Gaussian mixture fitting and BIC-based model selection
//! - **detect**: IQR, MAD, and KDE outlier detectors, global or per-cluster
//! - **combine**: Intersection of outlier index sets
//! - **pipeline**: Pipeline composition, configuration, and reporting
//!
//! # Example
//!
//! ```
//! use entity_outliers::prelude::*;
//!
//! let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
//!
//! let by_iqr = detect_iqr(&values, &IqrParams::default());
//! let by_mad = detect_mad(&values, &MadParams::default());
//! let flagged = intersect(&[by_iqr, by_mad]);
//!
//! assert!(flagged.contains(&5));
//! ```
//!
//! All detectors operate on a shared index space: index `i` refers to the
//! same entity in the value array, the feature matrix, the cluster label
//! array, and every outlier index set. No stage reorders or filters the
//! entity sequence.

pub mod cluster;
pub mod combine;
pub mod data;
pub mod detect;
pub mod error;
pub mod feature;
pub mod pipeline;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::cluster::{
        fit_gmm, select_model, CandidateScore, CovarianceFamily, GmmConfig, GmmFit,
        SelectedModel, SelectionConfig,
    };
    pub use crate::combine::intersect;
    pub use crate::data::{AttributeTable, ParseFailure};
    pub use crate::detect::{
        detect_iqr, detect_iqr_by_cluster, detect_kde, detect_kde_by_cluster, detect_mad,
        detect_mad_by_cluster, IqrParams, KdeParams, MadParams, OutlierSet,
    };
    pub use crate::error::{OutlierError, Result};
    pub use crate::feature::{
        extract_features, FeatureExtraction, LookupFailure, TagVocabulary, TypeLookup,
        TypeMatrix, TypeTable,
    };
    pub use crate::pipeline::{
        ClusterSummary, DetectorResult, DetectorSpec, OutlierReport, Pipeline, PipelineConfig,
    };
}
