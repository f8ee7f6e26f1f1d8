//! Weighted least-squares fit of a [`VariogramModel`] to an empirical
//! variogram.
//!
//! Projected Levenberg–Marquardt over the free subset of
//! `(nugget, psill, range)`. Fixed parameters stay pinned at the initial
//! guess; free ones are clamped to `nugget, psill >= 0` and
//! `range >= min_range` after every step.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::FitConfig;
use crate::error::{KrigingError, Result};
use crate::variography::experimental::{EmpiricalVariogram, LagBin};

use super::{IsoVariogramModel, ParameterMask, VariogramFamily, VariogramModel};

const MAX_DAMPING: f64 = 1e16;
const MIN_DAMPING: f64 = 1e-12;
const MIN_DIAGONAL: f64 = 1e-12;
/// Largest cosine between the residual vector and the Jacobian columns at
/// which a point where no damped step helps still counts as stationary.
const STALL_COSINE: f64 = 1e-6;

/// Per-bin weight in the least-squares objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitWeighting {
    /// `N_j`
    #[default]
    PairCount,
    /// `N_j / h_j²`
    PairCountOverLagSquared,
    /// `N_j / γ(h_j)²`, evaluated at the current model.
    Cressie,
    /// Unweighted.
    Ordinary,
}

impl FitWeighting {
    fn weight(&self, bin: &LagBin, model: &VariogramModel) -> f64 {
        let n = bin.pair_count as f64;
        match self {
            FitWeighting::PairCount => n,
            FitWeighting::PairCountOverLagSquared => {
                if bin.lag > 0.0 {
                    n / (bin.lag * bin.lag)
                } else {
                    n
                }
            }
            FitWeighting::Cressie => {
                let g = model.variogram(bin.lag).max(f64::EPSILON);
                n / (g * g)
            }
            FitWeighting::Ordinary => 1.0,
        }
    }
}

/// Starting values for `(nugget, psill, range)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialGuess {
    pub nugget: f64,
    pub psill: f64,
    pub range: f64,
}

impl InitialGuess {
    pub fn new(nugget: f64, psill: f64, range: f64) -> Self {
        Self {
            nugget,
            psill,
            range,
        }
    }

    /// Heuristic starting point read off the empirical variogram:
    /// half the first bin's semivariance as nugget (at most half the
    /// maximum), the remainder up to the maximum semivariance as partial
    /// sill, and the lag of the first bin reaching 70% of the maximum as
    /// range.
    pub fn from_empirical(empirical: &EmpiricalVariogram) -> Self {
        let max_g = empirical.max_semivariance();
        let positive_lag = |bin: &LagBin| if bin.lag > 0.0 { bin.lag } else { bin.upper };

        let nugget = empirical
            .bins
            .first()
            .map_or(0.0, |b| 0.5 * b.semivariance)
            .min(0.5 * max_g);
        let psill = (max_g - nugget).max(f64::EPSILON);
        let range = empirical
            .bins
            .iter()
            .find(|b| b.semivariance >= 0.7 * max_g)
            .or(empirical.bins.last())
            .map_or(empirical.cutoff, positive_lag);

        Self {
            nugget,
            psill,
            range,
        }
    }

    pub fn from_model(model: &VariogramModel) -> Self {
        Self::new(model.nugget, model.psill, model.range)
    }

    pub fn to_model(&self, family: VariogramFamily) -> Result<VariogramModel> {
        VariogramModel::new(family, self.nugget, self.psill, self.range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedVariogram {
    pub model: VariogramModel,
    /// Weighted sum of squared residuals at the returned model.
    pub sse: f64,
    pub iterations: usize,
}

/// Weighted sum of squared differences between `model` and the empirical
/// semivariances.
pub fn weighted_sse(
    empirical: &EmpiricalVariogram,
    model: &VariogramModel,
    weighting: FitWeighting,
) -> f64 {
    let problem = FitProblem::new(empirical, weighting, ParameterMask::all_fixed(), 0.0);
    problem.cost(model, &problem.weights(model))
}

struct FitProblem<'a> {
    empirical: &'a EmpiricalVariogram,
    weighting: FitWeighting,
    free: Vec<usize>,
    lower: [f64; 3],
}

impl<'a> FitProblem<'a> {
    fn new(
        empirical: &'a EmpiricalVariogram,
        weighting: FitWeighting,
        mask: ParameterMask,
        min_range: f64,
    ) -> Self {
        Self {
            empirical,
            weighting,
            free: mask.free_indices(),
            lower: [0.0, 0.0, min_range],
        }
    }

    fn weights(&self, model: &VariogramModel) -> Vec<f64> {
        self.empirical
            .bins
            .iter()
            .map(|b| self.weighting.weight(b, model))
            .collect()
    }

    fn cost(&self, model: &VariogramModel, weights: &[f64]) -> f64 {
        self.empirical
            .bins
            .iter()
            .zip(weights)
            .map(|(b, w)| {
                let d = model.variogram(b.lag) - b.semivariance;
                w * d * d
            })
            .sum()
    }

    fn residuals_and_jacobian(
        &self,
        model: &VariogramModel,
        weights: &[f64],
    ) -> (DVector<f64>, DMatrix<f64>) {
        let n = self.empirical.len();
        let mut residuals = DVector::zeros(n);
        let mut jacobian = DMatrix::zeros(n, self.free.len());

        for (j, (bin, w)) in self.empirical.bins.iter().zip(weights).enumerate() {
            let sw = w.sqrt();
            residuals[j] = sw * (model.variogram(bin.lag) - bin.semivariance);
            let grad = model.gradient(bin.lag);
            for (k, idx) in self.free.iter().enumerate() {
                jacobian[(j, k)] = sw * grad[*idx];
            }
        }

        (residuals, jacobian)
    }

    /// Norm of the gradient with components pushing into an active lower
    /// bound removed.
    fn projected_gradient_norm(&self, params: &[f64; 3], gradient: &DVector<f64>) -> f64 {
        self.free
            .iter()
            .enumerate()
            .map(|(k, idx)| {
                if params[*idx] <= self.lower[*idx] && gradient[k] > 0.0 {
                    0.0
                } else {
                    gradient[k]
                }
            })
            .map(|g| g * g)
            .sum::<f64>()
            .sqrt()
    }

    /// A free range below every lag leaves the structure flat over all bins,
    /// so the range gradient is exactly zero and the fit is degenerate.
    fn range_on_plateau(&self, model: &VariogramModel) -> bool {
        self.free.contains(&2)
            && model.psill > 0.0
            && self
                .empirical
                .bins
                .iter()
                .all(|b| model.gradient(b.lag)[2] == 0.0)
    }

    fn free_norm(&self, params: &[f64; 3]) -> f64 {
        self.free
            .iter()
            .map(|idx| params[*idx] * params[*idx])
            .sum::<f64>()
            .sqrt()
    }
}

/// Fits `family` to `empirical` starting from `initial_guess`, varying only
/// the parameters marked free in `free_mask`.
///
/// Returns `NonConvergence` when `config.max_iterations` steps pass without
/// meeting the tolerance, when the search stalls away from a stationary
/// point, or when it settles with a free range below every lag. The caller
/// decides whether to retry from another guess or fall back to the unfitted
/// model.
pub fn fit_variogram_model(
    empirical: &EmpiricalVariogram,
    initial_guess: &InitialGuess,
    free_mask: ParameterMask,
    family: VariogramFamily,
    config: &FitConfig,
) -> Result<FittedVariogram> {
    config.validate()?;
    let initial = initial_guess.to_model(family)?;
    let problem = FitProblem::new(empirical, config.weighting, free_mask, config.min_range);

    if problem.free.is_empty() {
        let sse = problem.cost(&initial, &problem.weights(&initial));
        return Ok(FittedVariogram {
            model: initial,
            sse,
            iterations: 0,
        });
    }

    let tol = config.tolerance;
    let mut model = initial;
    let mut damping = config.initial_damping;

    for iteration in 1..=config.max_iterations {
        let weights = problem.weights(&model);
        let (residuals, jacobian) = problem.residuals_and_jacobian(&model, &weights);
        let cost = residuals.norm_squared();
        let gradient = jacobian.tr_mul(&residuals);
        let normal = jacobian.tr_mul(&jacobian);
        let params = model.parameters();

        let projected_gradient = problem.projected_gradient_norm(&params, &gradient);

        if cost == 0.0 || projected_gradient <= tol * (1.0 + cost) {
            return finish(&problem, model, cost, iteration);
        }

        let mut accepted = None;
        while damping <= MAX_DAMPING {
            let mut damped = normal.clone();
            for k in 0..damped.nrows() {
                damped[(k, k)] += damping * normal[(k, k)].max(MIN_DIAGONAL);
            }

            let Some(chol) = damped.cholesky() else {
                damping *= 10.0;
                continue;
            };
            let step = chol.solve(&(-&gradient));

            let mut trial_params = params;
            for (k, idx) in problem.free.iter().enumerate() {
                trial_params[*idx] = (params[*idx] + step[k]).max(problem.lower[*idx]);
            }
            let trial = model.with_parameters(trial_params);
            let trial_cost = problem.cost(&trial, &weights);

            if trial_cost < cost {
                let step_norm = problem
                    .free
                    .iter()
                    .map(|idx| (trial_params[*idx] - params[*idx]).powi(2))
                    .sum::<f64>()
                    .sqrt();
                accepted = Some((trial, trial_cost, step_norm));
                damping = (damping / 10.0).max(MIN_DAMPING);
                break;
            }
            damping *= 10.0;
        }

        // no damped step lowers the objective any further
        let Some((trial, _, step_norm)) = accepted else {
            if projected_gradient <= STALL_COSINE * jacobian.norm() * residuals.norm() {
                return finish(&problem, model, cost, iteration);
            }
            tracing::debug!(iteration, projected_gradient, "variogram fit stalled");
            return Err(not_converged(&model, cost, iteration));
        };

        // weights move with the model under Cressie weighting
        let trial_sse = problem.cost(&trial, &problem.weights(&trial));
        tracing::debug!(iteration, sse = trial_sse, damping, "variogram fit step");

        let small_gain = (cost - trial_sse).abs() <= tol * cost;
        let small_step = step_norm <= tol * (problem.free_norm(&params) + tol);
        model = trial;

        if small_gain || small_step {
            return finish(&problem, model, trial_sse, iteration);
        }
    }

    let sse = problem.cost(&model, &problem.weights(&model));
    Err(not_converged(&model, sse, config.max_iterations))
}

fn finish(
    problem: &FitProblem<'_>,
    model: VariogramModel,
    sse: f64,
    iterations: usize,
) -> Result<FittedVariogram> {
    if sse > 0.0 && problem.range_on_plateau(&model) {
        tracing::debug!(range = model.range, "free range below every lag");
        return Err(not_converged(&model, sse, iterations));
    }
    Ok(converged(model, sse, iterations))
}

fn not_converged(model: &VariogramModel, sse: f64, iterations: usize) -> KrigingError {
    tracing::warn!(iterations, sse, model = %model, "variogram fit did not converge");
    KrigingError::NonConvergence { iterations, sse }
}

fn converged(model: VariogramModel, sse: f64, iterations: usize) -> FittedVariogram {
    tracing::info!(model = %model, sse, iterations, "variogram fit converged");
    FittedVariogram {
        model,
        sse,
        iterations,
    }
}
