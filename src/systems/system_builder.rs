use nalgebra::{DMatrix, DVector};

use crate::kriging::trend::TrendBasis;
use crate::spatial_database::{PredictionTarget, SamplePoint};
use crate::variography::model_variograms::{IsoVariogramModel, VariogramModel};

/// Assembles the augmented universal kriging system
///
/// ```text
/// | Γ   X | |λ|   |γ0|
/// | Xᵀ  0 | |μ| = |x0|
/// ```
///
/// in semivariance form. `Γ` and `γ0` are divided by the model sill so the
/// system, and its pivots, do not depend on the units of the data; `λ` is
/// unaffected and `μ` comes out divided by the same factor.
pub struct UKBuilder;

impl UKBuilder {
    /// Factor the semivariances are divided by.
    pub(crate) fn gamma_scale(vgram: &VariogramModel) -> f64 {
        let sill = vgram.sill();
        if sill > 0.0 && sill.is_finite() {
            sill
        } else {
            1.0
        }
    }

    /// Square `(n + p)` system matrix for `samples`.
    pub(crate) fn build_system_mat(
        samples: &[SamplePoint],
        basis: &TrendBasis,
        vgram: &VariogramModel,
    ) -> DMatrix<f64> {
        let n = samples.len();
        let p = basis.n_terms();
        let scale = Self::gamma_scale(vgram);
        let mut mat = DMatrix::zeros(n + p, n + p);

        // semivariance block, lower triangle mirrored
        for (i, s1) in samples.iter().enumerate() {
            for (j, s2) in samples.iter().enumerate().take(i) {
                let gamma = vgram.variogram(s1.distance_to(&s2.position)) / scale;
                mat[(i, j)] = gamma;
                mat[(j, i)] = gamma;
            }
            mat[(i, i)] = vgram.variogram(0.0) / scale;
        }

        // drift block and its transpose
        let x = basis.design(samples);
        for i in 0..n {
            for k in 0..p {
                mat[(i, n + k)] = x[(i, k)];
                mat[(n + k, i)] = x[(i, k)];
            }
        }

        mat
    }

    /// Right hand side `[γ0; x0]` for one target.
    pub(crate) fn build_rhs(
        samples: &[SamplePoint],
        basis: &TrendBasis,
        vgram: &VariogramModel,
        target: &PredictionTarget,
    ) -> DVector<f64> {
        let n = samples.len();
        let p = basis.n_terms();
        let scale = Self::gamma_scale(vgram);
        let mut rhs = DVector::zeros(n + p);

        for (i, s) in samples.iter().enumerate() {
            rhs[i] = vgram.variogram(s.distance_to(&target.position)) / scale;
        }
        for (k, v) in basis
            .row(&target.position, &target.covariates)
            .into_iter()
            .enumerate()
        {
            rhs[n + k] = v;
        }

        rhs
    }
}
