use nalgebra::{DMatrix, Point2};
use serde::{Deserialize, Serialize};

use crate::spatial_database::SamplePoint;

/// Drift terms embedded in the kriging system.
///
/// Every variant carries the intercept; the remaining columns are built
/// from the coordinates, the sample covariates, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendModel {
    /// Constant unknown mean.
    Ordinary,
    /// `[1, x, y]`
    #[default]
    LinearCoordinates,
    /// `[1, c_1, .., c_k]` from the sample covariates.
    ExternalDrift,
    /// `[1, x, y, c_1, .., c_k]`
    LinearCoordinatesWithDrift,
}

impl TrendModel {
    /// Number of trend columns `p` for samples carrying `n_covariates`.
    pub fn n_terms(&self, n_covariates: usize) -> usize {
        match self {
            TrendModel::Ordinary => 1,
            TrendModel::LinearCoordinates => 3,
            TrendModel::ExternalDrift => 1 + n_covariates,
            TrendModel::LinearCoordinatesWithDrift => 3 + n_covariates,
        }
    }

    pub fn uses_covariates(&self) -> bool {
        matches!(
            self,
            TrendModel::ExternalDrift | TrendModel::LinearCoordinatesWithDrift
        )
    }

    pub fn uses_coordinates(&self) -> bool {
        matches!(
            self,
            TrendModel::LinearCoordinates | TrendModel::LinearCoordinatesWithDrift
        )
    }

    /// Minimum number of samples a system with this trend can be solved with.
    pub fn min_samples(&self, n_covariates: usize) -> usize {
        self.n_terms(n_covariates).max(2)
    }
}

/// Trend columns standardised against the sample set they were fitted on.
///
/// Centring and scaling leaves the kriging predictor unchanged (the
/// intercept absorbs the shift) but keeps projected coordinates in the
/// hundreds of kilometres from dominating the pivots of the augmented
/// system. A column with zero spread keeps a unit scale so that a
/// degenerate configuration still shows up as a singular system.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TrendBasis {
    model: TrendModel,
    n_covariates: usize,
    centres: Vec<f64>,
    scales: Vec<f64>,
}

impl TrendBasis {
    pub fn fit(model: TrendModel, samples: &[SamplePoint]) -> Self {
        let n_covariates = if model.uses_covariates() {
            samples.first().map_or(0, |s| s.covariates.len())
        } else {
            0
        };

        let raw = samples
            .iter()
            .map(|s| raw_terms(model, &s.position, &s.covariates))
            .collect::<Vec<_>>();
        let n_raw = model.n_terms(n_covariates) - 1;
        let n = raw.len().max(1) as f64;

        let mut centres = vec![0.0; n_raw];
        let mut scales = vec![1.0; n_raw];
        for j in 0..n_raw {
            let mean = raw.iter().map(|r| r[j]).sum::<f64>() / n;
            let var = raw.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
            centres[j] = mean;
            let std = var.sqrt();
            if std > 0.0 && std.is_finite() {
                scales[j] = std;
            }
        }

        Self {
            model,
            n_covariates,
            centres,
            scales,
        }
    }

    pub fn n_terms(&self) -> usize {
        self.model.n_terms(self.n_covariates)
    }

    /// Standardised trend row at a location.
    pub fn row(&self, position: &Point2<f64>, covariates: &[f64]) -> Vec<f64> {
        std::iter::once(1.0)
            .chain(
                raw_terms(self.model, position, covariates)
                    .into_iter()
                    .zip(self.centres.iter().zip(&self.scales))
                    .map(|(v, (c, s))| (v - c) / s),
            )
            .collect()
    }

    /// `n x p` design matrix over `samples`.
    pub fn design(&self, samples: &[SamplePoint]) -> DMatrix<f64> {
        let p = self.n_terms();
        let mut x = DMatrix::zeros(samples.len(), p);
        for (i, s) in samples.iter().enumerate() {
            for (j, v) in self.row(&s.position, &s.covariates).into_iter().enumerate() {
                x[(i, j)] = v;
            }
        }
        x
    }
}

fn raw_terms(model: TrendModel, position: &Point2<f64>, covariates: &[f64]) -> Vec<f64> {
    let mut terms = Vec::with_capacity(2 + covariates.len());
    if model.uses_coordinates() {
        terms.push(position.x);
        terms.push(position.y);
    }
    if model.uses_covariates() {
        terms.extend_from_slice(covariates);
    }
    terms
}
