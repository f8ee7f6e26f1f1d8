use nalgebra::DVector;
use rayon::prelude::*;

use crate::config::{KrigingConfig, SearchNeighborhood};
use crate::error::{KrigingError, Result};
use crate::spatial_database::{PointSet, PredictionGrid, PredictionTarget, SamplePoint};
use crate::systems::lu::LUSystem;
use crate::systems::system_builder::UKBuilder;
use crate::variography::model_variograms::VariogramModel;

use super::result::{KrigingResult, Prediction};
use super::trend::{TrendBasis, TrendModel};

/// Universal kriging of `samples` onto every target of `grid`.
///
/// The trend is embedded in the system through Lagrange multipliers, so
/// `samples` carry raw observations rather than residuals. Predictions are
/// `λᵀv` and variances `λᵀγ0 + μᵀx0`, with round-off negatives clamped to
/// zero.
///
/// With a global neighbourhood the augmented matrix is factorised once and
/// shared by all targets. A local neighbourhood solves one system per
/// target over its nearest samples; targets with too few neighbours are
/// reported as [`Prediction::missing`].
pub fn krige(
    samples: &PointSet,
    trend: TrendModel,
    grid: &PredictionGrid,
    model: &VariogramModel,
    config: &KrigingConfig,
) -> Result<KrigingResult> {
    config.validate()?;
    let required = validate_inputs(samples, trend, grid)?;

    tracing::debug!(
        n_samples = samples.len(),
        n_targets = grid.len(),
        ?trend,
        %model,
        "kriging"
    );

    let result: KrigingResult = match config.neighborhood {
        SearchNeighborhood::Global => {
            let basis = TrendBasis::fit(trend, samples.samples());
            let mat = UKBuilder::build_system_mat(samples.samples(), &basis, model);
            let system = LUSystem::factorize(mat, samples.len(), config.pivot_tolerance)?;

            grid.targets()
                .par_iter()
                .map(|target| predict(&system, samples.samples(), &basis, model, target))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .collect()
        }
        SearchNeighborhood::Local {
            max_neighbors,
            max_distance,
        } => grid
            .targets()
            .par_iter()
            .map(|target| {
                let local = samples
                    .nearest(&target.position, max_neighbors, max_distance)
                    .into_iter()
                    .map(|i| samples.samples()[i].clone())
                    .collect::<Vec<_>>();

                if local.len() < required {
                    tracing::debug!(
                        x = target.position.x,
                        y = target.position.y,
                        neighbours = local.len(),
                        required,
                        "too few neighbours, target left missing"
                    );
                    return Ok(Prediction::missing());
                }

                let basis = TrendBasis::fit(trend, &local);
                let mat = UKBuilder::build_system_mat(&local, &basis, model);
                let system = LUSystem::factorize(mat, local.len(), config.pivot_tolerance)?;
                predict(&system, &local, &basis, model, target)
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .collect(),
    };

    let n_missing = result.n_missing();
    if n_missing > 0 {
        tracing::warn!(n_missing, n_targets = grid.len(), "targets without a prediction");
    }

    Ok(result)
}

/// Checks covariate consistency and returns the minimum sample count.
fn validate_inputs(samples: &PointSet, trend: TrendModel, grid: &PredictionGrid) -> Result<usize> {
    let n_covariates = samples.n_covariates();

    if trend.uses_covariates() {
        if n_covariates == 0 {
            return Err(KrigingError::invalid(
                "covariates",
                0.0,
                "an external drift needs at least one sample covariate",
            ));
        }
        if let Some(target) = grid
            .iter()
            .find(|t| t.covariates.len() != n_covariates)
        {
            return Err(KrigingError::invalid(
                "covariates",
                target.covariates.len() as f64,
                "target covariates must match the sample covariates",
            ));
        }
    }

    let required = trend.min_samples(n_covariates);
    if samples.len() < required {
        return Err(KrigingError::InsufficientData {
            context: "kriging samples",
            required,
            provided: samples.len(),
        });
    }

    Ok(required)
}

fn predict(
    system: &LUSystem,
    samples: &[SamplePoint],
    basis: &TrendBasis,
    model: &VariogramModel,
    target: &PredictionTarget,
) -> Result<Prediction> {
    let n = system.n_samples();
    let rhs = UKBuilder::build_rhs(samples, basis, model, target);
    let sol = system.solve(&rhs)?;

    let weights = sol.rows(0, n);
    let values = DVector::from_iterator(n, samples.iter().map(|s| s.value));

    let value = weights.dot(&values);
    let variance = (UKBuilder::gamma_scale(model) * sol.dot(&rhs)).max(0.0);

    Ok(Prediction::new(value, variance))
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use nalgebra::Point2;
    use proptest::prelude::*;

    use crate::variography::model_variograms::{IsoVariogramModel, VariogramFamily};

    use super::*;

    fn point_set(points: &[(f64, f64, f64)]) -> PointSet {
        PointSet::new(
            points
                .iter()
                .map(|&(x, y, v)| SamplePoint::new(x, y, v))
                .collect(),
        )
        .unwrap()
    }

    fn scattered() -> PointSet {
        point_set(&[
            (0.0, 0.0, 3.0),
            (12.0, 3.0, 5.0),
            (4.0, 15.0, 4.0),
            (18.0, 17.0, 8.0),
            (9.0, 8.0, 6.0),
            (25.0, 6.0, 7.5),
            (2.0, 24.0, 2.5),
            (21.0, 27.0, 9.0),
        ])
    }

    #[test]
    fn three_point_coordinate_trend() {
        let samples = point_set(&[(0.0, 0.0, 10.0), (10.0, 0.0, 20.0), (0.0, 10.0, 15.0)]);
        let model = VariogramModel::spherical(0.0, 25.0, 20.0).unwrap();
        let grid = PredictionGrid::from_points([Point2::new(5.0, 5.0)]);

        let result = krige(
            &samples,
            TrendModel::LinearCoordinates,
            &grid,
            &model,
            &KrigingConfig::default(),
        )
        .unwrap();
        let prediction = result.predictions[0];

        // three samples and three trend terms pin λ = (0, 0.5, 0.5)
        assert_relative_eq!(prediction.value, 17.5, epsilon = 1e-9);
        assert!(prediction.value > 10.0 && prediction.value < 20.0);

        let expected = 2.0 * model.variogram(50f64.sqrt()) - 0.5 * model.variogram(200f64.sqrt());
        assert_relative_eq!(prediction.variance, expected, epsilon = 1e-9);
        assert!(prediction.variance > 0.0);
    }

    #[test]
    fn exact_at_sample_location() {
        let samples = scattered();
        let model = VariogramModel::new(VariogramFamily::Exponential, 0.0, 6.0, 30.0).unwrap();
        let grid = PredictionGrid::from_points(samples.positions());

        for trend in [TrendModel::Ordinary, TrendModel::LinearCoordinates] {
            let result =
                krige(&samples, trend, &grid, &model, &KrigingConfig::default()).unwrap();
            for (prediction, sample) in result.iter().zip(samples.samples()) {
                assert_relative_eq!(prediction.value, sample.value, epsilon = 1e-8);
                assert_relative_eq!(prediction.variance, 0.0, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn ordinary_kriging_weights_sum_to_one() {
        // a constant field is reproduced exactly when weights sum to one
        let samples = point_set(&[
            (0.0, 0.0, 4.0),
            (10.0, 0.0, 4.0),
            (0.0, 10.0, 4.0),
            (7.0, 9.0, 4.0),
        ]);
        let model = VariogramModel::spherical(0.5, 2.0, 15.0).unwrap();
        let grid = PredictionGrid::from_points([Point2::new(3.0, 3.0), Point2::new(40.0, 40.0)]);
        let result = krige(
            &samples,
            TrendModel::Ordinary,
            &grid,
            &model,
            &KrigingConfig::default(),
        )
        .unwrap();
        for prediction in result.iter() {
            assert_relative_eq!(prediction.value, 4.0, epsilon = 1e-9);
        }
        // beyond the range every sample is uncorrelated with the target
        assert!(result.predictions[1].variance > result.predictions[0].variance);
    }

    #[test]
    fn coincident_samples_are_singular() {
        let samples = point_set(&[
            (0.0, 0.0, 1.0),
            (5.0, 5.0, 2.0),
            (5.0, 5.0, 3.0),
            (10.0, 0.0, 4.0),
        ]);
        let model = VariogramModel::spherical(0.5, 5.0, 20.0).unwrap();
        let grid = PredictionGrid::from_points([Point2::new(2.0, 2.0)]);
        assert!(matches!(
            krige(
                &samples,
                TrendModel::Ordinary,
                &grid,
                &model,
                &KrigingConfig::default()
            ),
            Err(KrigingError::SingularSystem { .. })
        ));
    }

    #[test]
    fn collinear_samples_with_coordinate_trend_are_singular() {
        let samples = point_set(&[
            (0.0, 0.0, 1.0),
            (1.0, 1.0, 2.0),
            (2.0, 2.0, 3.0),
            (3.0, 3.0, 2.0),
            (4.0, 4.0, 1.0),
        ]);
        let model = VariogramModel::spherical(0.0, 5.0, 20.0).unwrap();
        let grid = PredictionGrid::from_points([Point2::new(2.0, 0.0)]);
        assert!(matches!(
            krige(
                &samples,
                TrendModel::LinearCoordinates,
                &grid,
                &model,
                &KrigingConfig::default()
            ),
            Err(KrigingError::SingularSystem { .. })
        ));
    }

    #[test]
    fn too_few_samples_for_trend() {
        let samples = point_set(&[(0.0, 0.0, 1.0), (10.0, 0.0, 2.0)]);
        let model = VariogramModel::spherical(0.0, 5.0, 20.0).unwrap();
        let grid = PredictionGrid::from_points([Point2::new(5.0, 5.0)]);
        assert_eq!(
            krige(
                &samples,
                TrendModel::LinearCoordinates,
                &grid,
                &model,
                &KrigingConfig::default()
            ),
            Err(KrigingError::InsufficientData {
                context: "kriging samples",
                required: 3,
                provided: 2,
            })
        );
        assert!(krige(
            &samples,
            TrendModel::Ordinary,
            &grid,
            &model,
            &KrigingConfig::default()
        )
        .is_ok());
    }

    #[test]
    fn local_neighbourhood_covering_all_samples_matches_global() {
        let samples = scattered();
        let model = VariogramModel::spherical(0.2, 5.0, 25.0).unwrap();
        let grid = PredictionGrid::regular(Point2::new(1.0, 1.0), 6.0, 5, 5).unwrap();

        let global = krige(
            &samples,
            TrendModel::LinearCoordinates,
            &grid,
            &model,
            &KrigingConfig::default(),
        )
        .unwrap();
        let local = krige(
            &samples,
            TrendModel::LinearCoordinates,
            &grid,
            &model,
            &KrigingConfig {
                neighborhood: SearchNeighborhood::Local {
                    max_neighbors: samples.len(),
                    max_distance: None,
                },
                ..KrigingConfig::default()
            },
        )
        .unwrap();

        for (g, l) in global.iter().zip(local.iter()) {
            assert_relative_eq!(g.value, l.value, epsilon = 1e-8, max_relative = 1e-8);
            assert_relative_eq!(g.variance, l.variance, epsilon = 1e-8, max_relative = 1e-8);
        }
    }

    #[test]
    fn sparse_local_neighbourhood_is_missing() {
        let samples = scattered();
        let model = VariogramModel::spherical(0.2, 5.0, 25.0).unwrap();
        let grid = PredictionGrid::from_points([Point2::new(0.5, 0.5), Point2::new(100.0, 100.0)]);
        let result = krige(
            &samples,
            TrendModel::Ordinary,
            &grid,
            &model,
            &KrigingConfig {
                neighborhood: SearchNeighborhood::Local {
                    max_neighbors: 4,
                    max_distance: Some(15.0),
                },
                ..KrigingConfig::default()
            },
        )
        .unwrap();

        assert!(!result.predictions[0].is_missing());
        assert!(result.predictions[1].is_missing());
        assert!(result.predictions[1].variance.is_nan());
        assert_eq!(result.n_missing(), 1);
    }

    #[test]
    fn external_drift_reproduces_linear_covariate() {
        let drift = |c: f64| 3.0 + 2.0 * c;
        let covariates = [1.0, 4.0, 2.5, 7.0, 3.0, 5.5];
        let positions = [
            (0.0, 0.0),
            (10.0, 2.0),
            (3.0, 11.0),
            (14.0, 13.0),
            (6.0, 6.0),
            (18.0, 4.0),
        ];
        let samples = PointSet::new(
            positions
                .iter()
                .zip(covariates)
                .map(|(&(x, y), c)| SamplePoint::with_covariates(x, y, drift(c), vec![c]))
                .collect(),
        )
        .unwrap();
        let model = VariogramModel::new(VariogramFamily::Gaussian, 0.1, 4.0, 12.0).unwrap();
        let grid = PredictionGrid::from_targets(vec![
            PredictionTarget::with_covariates(8.0, 8.0, vec![6.0]),
            PredictionTarget::with_covariates(30.0, 30.0, vec![-2.0]),
        ]);

        let result = krige(
            &samples,
            TrendModel::ExternalDrift,
            &grid,
            &model,
            &KrigingConfig::default(),
        )
        .unwrap();
        assert_relative_eq!(result.predictions[0].value, drift(6.0), epsilon = 1e-8);
        assert_relative_eq!(result.predictions[1].value, drift(-2.0), epsilon = 1e-8);
    }

    #[test]
    fn target_covariates_must_match() {
        let samples = PointSet::new(vec![
            SamplePoint::with_covariates(0.0, 0.0, 1.0, vec![1.0]),
            SamplePoint::with_covariates(5.0, 0.0, 2.0, vec![2.0]),
            SamplePoint::with_covariates(0.0, 5.0, 3.0, vec![3.0]),
        ])
        .unwrap();
        let model = VariogramModel::spherical(0.0, 5.0, 20.0).unwrap();
        let grid = PredictionGrid::from_points([Point2::new(1.0, 1.0)]);
        assert!(matches!(
            krige(
                &samples,
                TrendModel::ExternalDrift,
                &grid,
                &model,
                &KrigingConfig::default()
            ),
            Err(KrigingError::InvalidParameter {
                name: "covariates",
                ..
            })
        ));

        let plain = scattered();
        assert!(matches!(
            krige(
                &plain,
                TrendModel::LinearCoordinatesWithDrift,
                &grid,
                &model,
                &KrigingConfig::default()
            ),
            Err(KrigingError::InvalidParameter {
                name: "covariates",
                ..
            })
        ));
    }

    #[test]
    fn prediction_scales_with_value_units() {
        let base = scattered();
        let grid = PredictionGrid::from_points([Point2::new(10.0, 10.0)]);

        for trend in [TrendModel::Ordinary, TrendModel::LinearCoordinates] {
            let reference = krige(
                &base,
                trend,
                &grid,
                &VariogramModel::spherical(0.0, 5.0, 25.0).unwrap(),
                &KrigingConfig::default(),
            )
            .unwrap()
            .predictions[0];

            for scale in [1e-3, 1e3, 1e4] {
                let samples = point_set(
                    &base
                        .samples()
                        .iter()
                        .map(|s| (s.position.x, s.position.y, s.value * scale))
                        .collect::<Vec<_>>(),
                );
                let model = VariogramModel::spherical(0.0, 5.0 * scale * scale, 25.0).unwrap();
                let prediction =
                    krige(&samples, trend, &grid, &model, &KrigingConfig::default())
                        .unwrap()
                        .predictions[0];

                assert_relative_eq!(prediction.value, reference.value * scale, max_relative = 1e-8);
                assert_relative_eq!(
                    prediction.variance,
                    reference.variance * scale * scale,
                    max_relative = 1e-8
                );
            }
        }
    }

    fn family_strategy() -> impl Strategy<Value = VariogramFamily> {
        prop::sample::select(VariogramFamily::ALL.to_vec())
    }

    fn trend_strategy() -> impl Strategy<Value = TrendModel> {
        prop::sample::select(vec![
            TrendModel::Ordinary,
            TrendModel::LinearCoordinates,
            TrendModel::ExternalDrift,
            TrendModel::LinearCoordinatesWithDrift,
        ])
    }

    // powers of two keep the rescaled inputs exact
    fn scale_strategy() -> impl Strategy<Value = f64> {
        prop::sample::select(vec![2f64.powi(-10), 2f64.powi(10), 2f64.powi(14)])
    }

    fn covariate(x: f64, y: f64) -> f64 {
        (x / 9.0).sin() + 0.02 * x * y / 10.0
    }

    fn krige_scaled(
        points: &[(f64, f64, f64)],
        trend: TrendModel,
        model: (VariogramFamily, f64, f64, f64),
        scale: f64,
    ) -> Result<KrigingResult> {
        let (family, nugget, psill, range) = model;
        let samples = PointSet::new(
            points
                .iter()
                .map(|&(x, y, v)| SamplePoint::with_covariates(x, y, v * scale, vec![covariate(x, y)]))
                .collect(),
        )?;
        let grid = PredictionGrid::from_targets(
            (0..81)
                .map(|k| {
                    let (x, y) = (-5.0 + (k % 9) as f64 * 7.0, -5.0 + (k / 9) as f64 * 7.0);
                    PredictionTarget::with_covariates(x, y, vec![covariate(x, y)])
                })
                .collect(),
        );
        let s2 = scale * scale;
        let model = VariogramModel::new(family, nugget * s2, psill * s2, range)?;
        krige(&samples, trend, &grid, &model, &KrigingConfig::default())
    }

    proptest! {
        #[test]
        fn variance_is_non_negative(
            jitter in prop::collection::vec((0.0..5.0f64, 0.0..5.0f64, -10.0..10.0f64), 25),
            n in 4usize..25,
            trend in trend_strategy(),
            family in family_strategy(),
            nugget in 0.0..2.0f64,
            psill in 0.1..10.0f64,
            range in 5.0..80.0f64,
            scale in scale_strategy(),
        ) {
            // one sample per 10x10 cell keeps positions distinct
            let points = jitter
                .iter()
                .take(n)
                .enumerate()
                .map(|(i, &(jx, jy, v))| ((i % 5) as f64 * 10.0 + jx, (i / 5) as f64 * 10.0 + jy, v))
                .collect::<Vec<_>>();
            let model = (family, nugget, psill, range);

            let reference = krige_scaled(&points, trend, model, 1.0);
            let scaled = krige_scaled(&points, trend, model, scale);
            prop_assert_eq!(reference.is_ok(), scaled.is_ok());

            if let (Ok(reference), Ok(scaled)) = (reference, scaled) {
                for (r, s) in reference.iter().zip(scaled.iter()) {
                    prop_assert!(s.variance.is_finite());
                    prop_assert!(s.variance >= 0.0);
                    prop_assert!(s.value.is_finite());
                    prop_assert!((s.value - r.value * scale).abs() <= 1e-9 * (1.0 + r.value.abs()) * scale);
                    prop_assert!(
                        (s.variance - r.variance * scale * scale).abs()
                            <= 1e-9 * (1.0 + r.variance) * scale * scale
                    );
                }
            }
        }
    }
}
