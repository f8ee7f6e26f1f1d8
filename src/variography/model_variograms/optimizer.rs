use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};

use crate::config::FitConfig;
use crate::error::{KrigingError, Result};
use crate::variography::experimental::EmpiricalVariogram;

use super::iso_fitter::{fit_variogram_model, FittedVariogram, InitialGuess};
use super::{ParameterMask, VariogramFamily};

/// Multi-start wrapper around [`fit_variogram_model`].
///
/// Fits from `initial_guess` and from `n_restarts` random starting points
/// (free ranges drawn from `(0, max lag]`, free sills from
/// `(0, max semivariance]`, fixed parameters keep their pinned value) and
/// keeps the converged fit with the lowest weighted SSE. If no start
/// converges the error of the last attempt is returned.
pub fn fit_variogram_with_restarts(
    empirical: &EmpiricalVariogram,
    initial_guess: &InitialGuess,
    free_mask: ParameterMask,
    family: VariogramFamily,
    config: &FitConfig,
    n_restarts: usize,
    seed: u64,
) -> Result<FittedVariogram> {
    let mut rng = StdRng::seed_from_u64(seed);

    let max_lag = empirical.max_lag().max(config.min_range * 2.0);
    let max_sill = empirical.max_semivariance().max(f64::EPSILON);
    let range_dist = Uniform::new_inclusive(config.min_range.max(max_lag * 1e-3), max_lag);
    let sill_dist = Uniform::new_inclusive(0.0, max_sill);

    let starts = std::iter::once(*initial_guess)
        .chain((0..n_restarts).map(|_| InitialGuess {
            nugget: if free_mask.nugget {
                sill_dist.sample(&mut rng)
            } else {
                initial_guess.nugget
            },
            psill: if free_mask.psill {
                sill_dist.sample(&mut rng)
            } else {
                initial_guess.psill
            },
            range: if free_mask.range {
                range_dist.sample(&mut rng)
            } else {
                initial_guess.range
            },
        }))
        .collect::<Vec<_>>();

    let mut last_err = None;
    let best = starts
        .iter()
        .enumerate()
        .filter_map(
            |(attempt, guess)| match fit_variogram_model(empirical, guess, free_mask, family, config)
            {
                Ok(fit) => Some(fit),
                Err(err) => {
                    tracing::debug!(attempt, error = %err, "variogram fit attempt failed");
                    last_err = Some(err);
                    None
                }
            },
        )
        .min_by_key(|fit| OrderedFloat(fit.sse));

    match (best, last_err) {
        (Some(fit), _) => Ok(fit),
        (None, Some(err)) => Err(err),
        (None, None) => Err(KrigingError::InsufficientData {
            context: "variogram fit attempts",
            required: 1,
            provided: 0,
        }),
    }
}
