//! Mixture-model selection by BIC grid search.

use crate::cluster::gmm::{fit_gmm, CovarianceFamily, GmmConfig, GmmFit};
use crate::error::{OutlierError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for the model-selection grid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Exclusive upper bound on component counts; the grid covers
    /// `1..max_components`.
    pub max_components: usize,
    /// Covariance families to search, in tie-break order.
    pub families: Vec<CovarianceFamily>,
    /// EM settings shared by every candidate fit.
    pub gmm: GmmConfig,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_components: 10,
            families: CovarianceFamily::ALL.to_vec(),
            gmm: GmmConfig::default(),
        }
    }
}

/// Outcome of one candidate configuration in the search grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Covariance family of the candidate.
    pub family: CovarianceFamily,
    /// Component count of the candidate.
    pub n_components: usize,
    /// BIC of the fit, absent when the fit was degenerate.
    pub bic: Option<f64>,
    /// Log-likelihood of the fit, absent when the fit was degenerate.
    pub log_likelihood: Option<f64>,
    /// Failure description for degenerate fits.
    pub error: Option<String>,
}

/// The winning model of a selection run.
#[derive(Debug, Clone)]
pub struct SelectedModel {
    /// The retained mixture fit.
    pub fit: GmmFit,
    /// Hard cluster label per entity, 0-indexed and contiguous.
    pub labels: Vec<usize>,
    /// BIC of the retained fit.
    pub bic: f64,
    /// Scores for every candidate in grid order, including skipped ones.
    pub candidates: Vec<CandidateScore>,
}

impl SelectedModel {
    /// Number of clusters in the selected model.
    pub fn n_clusters(&self) -> usize {
        self.fit.n_components
    }
}

impl fmt::Display for SelectedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Selected Mixture Model")?;
        writeln!(f, "  Family:      {}", self.fit.family)?;
        writeln!(f, "  Components:  {}", self.fit.n_components)?;
        writeln!(f, "  BIC:         {:.3}", self.bic)?;
        writeln!(f, "  Candidates:  {}", self.candidates.len())?;
        let skipped = self.candidates.iter().filter(|c| c.bic.is_none()).count();
        writeln!(f, "  Skipped:     {}", skipped)?;
        Ok(())
    }
}

/// Search covariance families × component counts and return the fit with
/// the lowest BIC.
///
/// The grid iterates families in the configured order, component counts
/// `1..max_components` within each family. Candidates are fitted in
/// parallel; the reduction keeps the first candidate in grid order that
/// achieves the minimum BIC, so results are deterministic. Degenerate fits
/// (singular covariance, collapsed component) are recorded and skipped.
/// When every candidate fails the search reports `NoViableModel` rather
/// than falling back to an arbitrary fit.
pub fn select_model(x: &DMatrix<f64>, config: &SelectionConfig) -> Result<SelectedModel> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(OutlierError::EmptyData(
            "Cannot select a model over an empty feature matrix".to_string(),
        ));
    }
    if config.max_components < 2 {
        return Err(OutlierError::InvalidParameter(
            "max_components must be at least 2".to_string(),
        ));
    }
    if config.families.is_empty() {
        return Err(OutlierError::InvalidParameter(
            "At least one covariance family is required".to_string(),
        ));
    }

    let grid: Vec<(CovarianceFamily, usize)> = config
        .families
        .iter()
        .flat_map(|&family| (1..config.max_components).map(move |k| (family, k)))
        .collect();

    // Candidate fits are independent; evaluate them in parallel.
    let fits: Vec<Result<GmmFit>> = grid
        .par_iter()
        .map(|&(family, k)| fit_gmm(x, k, family, &config.gmm))
        .collect();

    let n_obs = x.nrows();
    let mut candidates = Vec::with_capacity(grid.len());
    let mut best: Option<(usize, f64)> = None;

    for (idx, (&(family, n_components), fit)) in grid.iter().zip(&fits).enumerate() {
        match fit {
            Ok(fit) => {
                let bic = fit.bic(n_obs);
                if bic.is_finite() {
                    // Strict comparison keeps the earliest grid entry on ties.
                    let better = match best {
                        Some((_, best_bic)) => bic < best_bic,
                        None => true,
                    };
                    if better {
                        best = Some((idx, bic));
                    }
                }
                candidates.push(CandidateScore {
                    family,
                    n_components,
                    bic: Some(bic),
                    log_likelihood: Some(fit.log_likelihood),
                    error: None,
                });
            }
            Err(e) => candidates.push(CandidateScore {
                family,
                n_components,
                bic: None,
                log_likelihood: None,
                error: Some(e.to_string()),
            }),
        }
    }

    let (best_idx, bic) = best.ok_or(OutlierError::NoViableModel {
        n_candidates: grid.len(),
    })?;

    let fit = match &fits[best_idx] {
        Ok(fit) => fit.clone(),
        Err(_) => unreachable!("best candidate recorded from a successful fit"),
    };
    let labels = fit.predict(x)?;

    Ok(SelectedModel {
        fit,
        labels,
        bic,
        candidates,
    })
}
