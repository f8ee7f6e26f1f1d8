use nalgebra::{DMatrix, DVector, Dyn, LU};

use crate::error::{KrigingError, Result};

/// LU factorisation (partial pivoting) of an augmented kriging system.
///
/// The augmented matrix is symmetric but indefinite, so Cholesky does not
/// apply. The factorisation is computed once and shared read-only between
/// every target solved against the same samples.
#[derive(Debug)]
pub struct LUSystem {
    lu: LU<f64, Dyn, Dyn>,
    n_samples: usize,
    pivot_ratio: f64,
}

impl LUSystem {
    /// Factorises `mat`, whose first `n_samples` rows belong to the samples.
    ///
    /// Fails with [`KrigingError::SingularSystem`] when the smallest pivot
    /// magnitude relative to the largest falls below `pivot_tolerance`.
    pub fn factorize(mat: DMatrix<f64>, n_samples: usize, pivot_tolerance: f64) -> Result<Self> {
        let lu = mat.lu();
        let pivot_ratio = pivot_ratio(&lu);
        if !(pivot_ratio > pivot_tolerance) {
            tracing::debug!(pivot_ratio, pivot_tolerance, "kriging system is singular");
            return Err(KrigingError::SingularSystem { pivot_ratio });
        }
        Ok(Self {
            lu,
            n_samples,
            pivot_ratio,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn pivot_ratio(&self) -> f64 {
        self.pivot_ratio
    }

    /// Solves for `[λ; μ]`.
    pub fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        self.lu
            .solve(rhs)
            .filter(|sol| sol.iter().all(|v| v.is_finite()))
            .ok_or(KrigingError::SingularSystem {
                pivot_ratio: self.pivot_ratio,
            })
    }
}

fn pivot_ratio(lu: &LU<f64, Dyn, Dyn>) -> f64 {
    let u = lu.u();
    let (min, max) = u
        .diagonal()
        .iter()
        .map(|v| v.abs())
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max > 0.0 && max.is_finite() {
        min / max
    } else {
        0.0
    }
}
