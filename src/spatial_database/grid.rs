use itertools::iproduct;
use nalgebra::Point2;

use crate::error::{KrigingError, Result};

/// Location at which a prediction is requested.
///
/// `covariates` must line up with the sample covariates when an external
/// drift is part of the trend.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTarget {
    pub position: Point2<f64>,
    pub covariates: Vec<f64>,
}

impl PredictionTarget {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            covariates: Vec::new(),
        }
    }

    pub fn with_covariates(x: f64, y: f64, covariates: Vec<f64>) -> Self {
        Self {
            position: Point2::new(x, y),
            covariates,
        }
    }
}

/// Ordered set of prediction targets. Results are aligned with this order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionGrid {
    targets: Vec<PredictionTarget>,
}

impl PredictionGrid {
    pub fn from_targets(targets: Vec<PredictionTarget>) -> Self {
        Self { targets }
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point2<f64>>,
    {
        let targets = points
            .into_iter()
            .map(|position| PredictionTarget {
                position,
                covariates: Vec::new(),
            })
            .collect();
        Self { targets }
    }

    /// Regular raster of `nx * ny` cell centres starting at `origin`,
    /// row-major with x varying fastest.
    pub fn regular(origin: Point2<f64>, spacing: f64, nx: usize, ny: usize) -> Result<Self> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(KrigingError::invalid(
                "spacing",
                spacing,
                "grid spacing must be finite and strictly positive",
            ));
        }

        let targets = iproduct!(0..ny, 0..nx)
            .map(|(j, i)| {
                PredictionTarget::new(
                    origin.x + i as f64 * spacing,
                    origin.y + j as f64 * spacing,
                )
            })
            .collect();

        Ok(Self { targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> &[PredictionTarget] {
        &self.targets
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PredictionTarget> {
        self.targets.iter()
    }
}

impl FromIterator<PredictionTarget> for PredictionGrid {
    fn from_iter<T: IntoIterator<Item = PredictionTarget>>(iter: T) -> Self {
        Self {
            targets: iter.into_iter().collect(),
        }
    }
}
