//! Gaussian mixture clustering over binary type-membership features.
//!
//! `gmm` fits a single mixture configuration via EM; `select` searches a
//! grid of covariance families and component counts and keeps the fit with
//! the lowest BIC.

mod gmm;
mod select;

pub use gmm::{fit_gmm, CovarianceFamily, GmmConfig, GmmFit};
pub use select::{select_model, CandidateScore, SelectedModel, SelectionConfig};
