use crate::config::TerrakrigeConfig;
use crate::error::{KrigingError, Result};
use crate::kriging::{krige, KrigingResult};
use crate::spatial_database::{PointSet, PredictionGrid};
use crate::variography::experimental::{
    estimate_with_binning, EmpiricalVariogram, VariogramBinning,
};
use crate::variography::model_variograms::iso_fitter::{
    fit_variogram_model, weighted_sse, FittedVariogram, InitialGuess,
};

/// Everything produced by one run of [`interpolate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolation {
    pub empirical: EmpiricalVariogram,
    pub fitted: FittedVariogram,
    /// Whether `fitted` is the unfitted initial guess after a failed fit.
    pub fell_back: bool,
    pub result: KrigingResult,
}

/// Empirical variogram, model fit and kriging in one pass.
///
/// Binning and the initial guess come from `config` when given and are
/// otherwise derived from the data. A fit that does not converge is an
/// error unless `config.variogram.fallback_on_nonconvergence` is set, in
/// which case the initial guess is used as the model.
pub fn interpolate(
    samples: &PointSet,
    grid: &PredictionGrid,
    config: &TerrakrigeConfig,
) -> Result<Interpolation> {
    config.validate()?;

    let binning = match config.binning {
        Some(binning) => binning,
        None => VariogramBinning::from_extent(samples)?,
    };
    let empirical = estimate_with_binning(samples, &binning)?;

    let guess = config
        .variogram
        .initial_guess
        .unwrap_or_else(|| InitialGuess::from_empirical(&empirical));

    let (fitted, fell_back) = match fit_variogram_model(
        &empirical,
        &guess,
        config.variogram.free,
        config.variogram.family,
        &config.fit,
    ) {
        Ok(fitted) => (fitted, false),
        Err(KrigingError::NonConvergence { iterations, sse })
            if config.variogram.fallback_on_nonconvergence =>
        {
            tracing::warn!(
                iterations,
                sse,
                "variogram fit did not converge, using the initial guess"
            );
            let model = guess.to_model(config.variogram.family)?;
            let fitted = FittedVariogram {
                model,
                sse: weighted_sse(&empirical, &model, config.fit.weighting),
                iterations: 0,
            };
            (fitted, true)
        }
        Err(err) => return Err(err),
    };

    tracing::info!(
        model = %fitted.model,
        sse = fitted.sse,
        iterations = fitted.iterations,
        bins = empirical.len(),
        "variogram model"
    );

    let result = krige(
        samples,
        config.trend,
        grid,
        &fitted.model,
        &config.kriging,
    )?;

    Ok(Interpolation {
        empirical,
        fitted,
        fell_back,
        result,
    })
}

#[cfg(test)]
mod test {
    use nalgebra::Point2;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::config::FitConfig;
    use crate::spatial_database::SamplePoint;
    use crate::variography::model_variograms::ParameterMask;

    use super::*;

    fn synthetic_samples(seed: u64) -> PointSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let samples = (0..60)
            .map(|_| {
                let x: f64 = rng.gen_range(0.0..100.0);
                let y: f64 = rng.gen_range(0.0..100.0);
                let value = 5.0 + (x / 12.0).sin() + (y / 18.0).cos() + rng.gen_range(-0.2..0.2);
                SamplePoint::new(x, y, value)
            })
            .collect();
        PointSet::new(samples).unwrap()
    }

    #[test]
    fn end_to_end_with_defaults() {
        let samples = synthetic_samples(11);
        let grid = PredictionGrid::regular(Point2::new(5.0, 5.0), 10.0, 10, 10).unwrap();

        let mut config = TerrakrigeConfig::default();
        config.variogram.fallback_on_nonconvergence = true;
        let run = interpolate(&samples, &grid, &config).unwrap();

        assert!(!run.empirical.is_empty());
        assert!(run.fitted.sse.is_finite());
        assert_eq!(run.result.len(), grid.len());
        assert_eq!(run.result.n_missing(), 0);
        for prediction in run.result.iter() {
            assert!(prediction.value.is_finite());
            assert!(prediction.variance >= 0.0);
        }
    }

    #[test]
    fn falls_back_to_initial_guess() {
        let samples = synthetic_samples(3);
        let grid = PredictionGrid::from_points([Point2::new(50.0, 50.0)]);
        let mut config = TerrakrigeConfig::default();
        config.variogram.initial_guess = Some(InitialGuess::new(0.1, 1.0, 30.0));
        config.variogram.fallback_on_nonconvergence = true;
        config.fit = FitConfig {
            max_iterations: 1,
            tolerance: 0.0,
            ..FitConfig::default()
        };

        let run = interpolate(&samples, &grid, &config).unwrap();
        assert!(run.fell_back);
        assert_eq!(run.fitted.model.range, 30.0);
        assert_eq!(run.fitted.iterations, 0);

        config.variogram.fallback_on_nonconvergence = false;
        assert!(matches!(
            interpolate(&samples, &grid, &config),
            Err(KrigingError::NonConvergence { .. })
        ));
    }

    #[test]
    fn pinned_parameters_survive_the_run() {
        let samples = synthetic_samples(5);
        let grid = PredictionGrid::from_points([Point2::new(20.0, 70.0)]);
        let mut config = TerrakrigeConfig::default();
        config.variogram.initial_guess = Some(InitialGuess::new(0.0, 1.5, 40.0));
        config.variogram.free = ParameterMask {
            nugget: true,
            psill: false,
            range: false,
        };

        let run = interpolate(&samples, &grid, &config).unwrap();
        assert_eq!(run.fitted.model.psill, 1.5);
        assert_eq!(run.fitted.model.range, 40.0);
    }
}
