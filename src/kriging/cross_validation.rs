use rayon::prelude::*;

use crate::config::KrigingConfig;
use crate::error::{KrigingError, Result};
use crate::spatial_database::{PointSet, PredictionGrid, PredictionTarget};
use crate::variography::model_variograms::VariogramModel;

use super::trend::TrendModel;
use super::universal_kriging::krige;

/// Leave-one-out outcome for a single sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossValidationResidual {
    pub observed: f64,
    pub predicted: f64,
    pub variance: f64,
    /// `observed - predicted`
    pub residual: f64,
    /// Residual over the kriging standard error; NaN when the variance is zero.
    pub zscore: f64,
}

impl CrossValidationResidual {
    fn new(observed: f64, predicted: f64, variance: f64) -> Self {
        let residual = observed - predicted;
        let sd = variance.sqrt();
        let zscore = if sd > 0.0 { residual / sd } else { f64::NAN };
        Self {
            observed,
            predicted,
            variance,
            residual,
            zscore,
        }
    }
}

/// Residuals in sample order. Summary statistics skip non-finite entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossValidation {
    pub residuals: Vec<CrossValidationResidual>,
}

impl CrossValidation {
    pub fn len(&self) -> usize {
        self.residuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residuals.is_empty()
    }

    pub fn mean_error(&self) -> f64 {
        mean(self.residuals.iter().map(|r| r.residual))
    }

    pub fn rmse(&self) -> f64 {
        mean(self.residuals.iter().map(|r| r.residual * r.residual)).sqrt()
    }

    /// Close to one when the model variances match the observed errors.
    pub fn mean_squared_zscore(&self) -> f64 {
        mean(self.residuals.iter().map(|r| r.zscore * r.zscore))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Leave-one-out cross-validation: every sample is predicted from all the
/// others with the same trend, model and neighbourhood.
pub fn cross_validate(
    samples: &PointSet,
    trend: TrendModel,
    model: &VariogramModel,
    config: &KrigingConfig,
) -> Result<CrossValidation> {
    let required = trend.min_samples(samples.n_covariates()) + 1;
    if samples.len() < required {
        return Err(KrigingError::InsufficientData {
            context: "cross-validation samples",
            required,
            provided: samples.len(),
        });
    }

    let residuals = (0..samples.len())
        .into_par_iter()
        .map(|i| {
            let held_out = &samples.samples()[i];
            let grid = PredictionGrid::from_targets(vec![PredictionTarget {
                position: held_out.position,
                covariates: held_out.covariates.clone(),
            }]);
            let result = krige(&samples.without(i), trend, &grid, model, config)?;
            let prediction = result.predictions[0];
            Ok(CrossValidationResidual::new(
                held_out.value,
                prediction.value,
                prediction.variance,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let cv = CrossValidation { residuals };
    tracing::info!(
        n = cv.len(),
        mean_error = cv.mean_error(),
        rmse = cv.rmse(),
        mean_squared_zscore = cv.mean_squared_zscore(),
        "leave-one-out cross-validation"
    );
    Ok(cv)
}
