//! Pipeline composition, configuration, and reporting.

use crate::cluster::{select_model, SelectionConfig};
use crate::combine::intersect;
use crate::data::AttributeTable;
use crate::detect::{
    detect_iqr, detect_iqr_by_cluster, detect_kde, detect_kde_by_cluster, detect_mad,
    detect_mad_by_cluster, IqrParams, KdeParams, MadParams, OutlierSet,
};
use crate::error::{OutlierError, Result};
use crate::feature::TypeMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One detector configuration in a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DetectorSpec {
    /// Range-based detection (percentile envelope).
    Iqr {
        upper: f64,
        lower: f64,
        factor: f64,
    },
    /// Deviation-based detection (median absolute deviation).
    Mad { factor: f64 },
    /// Density-based detection (Gaussian kernel density estimate).
    Kde {
        bandwidth: Option<f64>,
        threshold: f64,
    },
}

impl DetectorSpec {
    /// Human-readable label used in reports.
    pub fn label(&self) -> String {
        match self {
            DetectorSpec::Iqr {
                upper,
                lower,
                factor,
            } => format!("iqr({}, {}, {})", upper, lower, factor),
            DetectorSpec::Mad { factor } => format!("mad({})", factor),
            DetectorSpec::Kde {
                bandwidth,
                threshold,
            } => match bandwidth {
                Some(h) => format!("kde(h={}, {})", h, threshold),
                None => format!("kde(auto, {})", threshold),
            },
        }
    }

    /// Run this detector globally or conditioned on cluster labels.
    pub fn run(&self, values: &[f64], labels: Option<&[usize]>) -> Result<OutlierSet> {
        match self {
            DetectorSpec::Iqr {
                upper,
                lower,
                factor,
            } => {
                let params = IqrParams {
                    upper: *upper,
                    lower: *lower,
                    factor: *factor,
                };
                match labels {
                    Some(labels) => detect_iqr_by_cluster(values, labels, &params),
                    None => Ok(detect_iqr(values, &params)),
                }
            }
            DetectorSpec::Mad { factor } => {
                let params = MadParams { factor: *factor };
                match labels {
                    Some(labels) => detect_mad_by_cluster(values, labels, &params),
                    None => Ok(detect_mad(values, &params)),
                }
            }
            DetectorSpec::Kde {
                bandwidth,
                threshold,
            } => {
                let params = KdeParams {
                    bandwidth: *bandwidth,
                    threshold: *threshold,
                };
                match labels {
                    Some(labels) => detect_kde_by_cluster(values, labels, &params),
                    None => Ok(detect_kde(values, &params)),
                }
            }
        }
    }
}

/// Pipeline configuration for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name of the pipeline.
    pub name: String,
    /// Detectors to run.
    pub detectors: Vec<DetectorSpec>,
    /// Cluster-conditioning settings; `None` runs detectors globally.
    pub clustering: Option<SelectionConfig>,
    /// Whether to intersect the detector results.
    #[serde(default = "default_combine")]
    pub combine: bool,
}

fn default_combine() -> bool {
    true
}

impl PipelineConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(OutlierError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(OutlierError::from)
    }
}

/// Result of one detector run within a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorResult {
    /// Report label of the detector configuration.
    pub detector: String,
    /// Flagged entity indices, ascending.
    pub indices: Vec<usize>,
    /// Entity identifiers resolved from the indices.
    pub entity_ids: Vec<String>,
}

/// Summary of the clustering used for conditioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Number of clusters in the selected model.
    pub n_clusters: usize,
    /// Covariance family of the selected model.
    pub family: String,
    /// BIC of the selected model.
    pub bic: f64,
    /// Entity count per cluster, indexed by label.
    pub sizes: Vec<usize>,
}

/// Outcome of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierReport {
    /// Pipeline name.
    pub name: String,
    /// Number of entities analyzed.
    pub n_entities: usize,
    /// Per-detector results in pipeline order.
    pub detectors: Vec<DetectorResult>,
    /// Intersection across all detectors, when combining was requested.
    pub combined: Option<DetectorResult>,
    /// Clustering summary, when conditioning was requested.
    pub clustering: Option<ClusterSummary>,
}

impl OutlierReport {
    /// Serialize the report to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(OutlierError::from)
    }
}

impl fmt::Display for OutlierReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Outlier Report: {}", self.name)?;
        writeln!(f, "  Entities: {}", self.n_entities)?;
        if let Some(c) = &self.clustering {
            writeln!(
                f,
                "  Clusters: {} ({}, BIC {:.2})",
                c.n_clusters, c.family, c.bic
            )?;
        }
        for d in &self.detectors {
            writeln!(f, "  {}: {} flagged", d.detector, d.indices.len())?;
        }
        if let Some(combined) = &self.combined {
            writeln!(f, "  intersection: {} flagged", combined.indices.len())?;
        }
        Ok(())
    }
}

/// Builder for composing and running detection pipelines.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    detectors: Vec<DetectorSpec>,
    clustering: Option<SelectionConfig>,
    combine: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            name: "unnamed".to_string(),
            detectors: Vec::new(),
            clustering: None,
            combine: true,
        }
    }

    /// Create from a config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            name: config.name.clone(),
            detectors: config.detectors.clone(),
            clustering: config.clustering.clone(),
            combine: config.combine,
        }
    }

    /// Set the pipeline name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Add a range-based detector.
    pub fn iqr(mut self, params: IqrParams) -> Self {
        self.detectors.push(DetectorSpec::Iqr {
            upper: params.upper,
            lower: params.lower,
            factor: params.factor,
        });
        self
    }

    /// Add a deviation-based detector.
    pub fn mad(mut self, params: MadParams) -> Self {
        self.detectors.push(DetectorSpec::Mad {
            factor: params.factor,
        });
        self
    }

    /// Add a density-based detector.
    pub fn kde(mut self, params: KdeParams) -> Self {
        self.detectors.push(DetectorSpec::Kde {
            bandwidth: params.bandwidth,
            threshold: params.threshold,
        });
        self
    }

    /// Condition all detectors on a mixture-model clustering.
    pub fn cluster(mut self, config: SelectionConfig) -> Self {
        self.clustering = Some(config);
        self
    }

    /// Enable or disable the intersection of detector results.
    pub fn combine(mut self, combine: bool) -> Self {
        self.combine = combine;
        self
    }

    /// Run the pipeline over an attribute table.
    ///
    /// When clustering is configured, a type-membership matrix with one row
    /// per entity must be supplied; its row count must match the table.
    pub fn run(
        &self,
        table: &AttributeTable,
        features: Option<&TypeMatrix>,
    ) -> Result<OutlierReport> {
        if self.detectors.is_empty() {
            return Err(OutlierError::InvalidParameter(
                "Pipeline has no detectors".to_string(),
            ));
        }

        let values = table.values();

        let (labels, clustering) = match &self.clustering {
            Some(config) => {
                let matrix = features.ok_or_else(|| {
                    OutlierError::InvalidParameter(
                        "Clustering requested but no feature matrix supplied".to_string(),
                    )
                })?;
                if matrix.n_entities() != table.n_entities() {
                    return Err(OutlierError::DimensionMismatch {
                        expected: table.n_entities(),
                        actual: matrix.n_entities(),
                    });
                }
                let model = select_model(&matrix.to_dense(), config)?;
                let mut sizes = vec![0usize; model.n_clusters()];
                for &label in &model.labels {
                    sizes[label] += 1;
                }
                let summary = ClusterSummary {
                    n_clusters: model.n_clusters(),
                    family: model.fit.family.to_string(),
                    bic: model.bic,
                    sizes,
                };
                (Some(model.labels), Some(summary))
            }
            None => (None, None),
        };

        let mut sets = Vec::with_capacity(self.detectors.len());
        let mut detectors = Vec::with_capacity(self.detectors.len());
        for spec in &self.detectors {
            let set = spec.run(values, labels.as_deref())?;
            detectors.push(detector_result(spec.label(), &set, table));
            sets.push(set);
        }

        let combined = if self.combine {
            let set = intersect(&sets);
            Some(detector_result("intersection".to_string(), &set, table))
        } else {
            None
        };

        Ok(OutlierReport {
            name: self.name.clone(),
            n_entities: table.n_entities(),
            detectors,
            combined,
            clustering,
        })
    }
}

fn detector_result(detector: String, set: &OutlierSet, table: &AttributeTable) -> DetectorResult {
    let indices: Vec<usize> = set.iter().copied().collect();
    let entity_ids = indices
        .iter()
        .map(|&i| table.entity_at(i).unwrap_or("").to_string())
        .collect();
    DetectorResult {
        detector,
        indices,
        entity_ids,
    }
}
