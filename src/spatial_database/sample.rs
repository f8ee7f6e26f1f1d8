use nalgebra::Point2;

/// A single observation: planar position, observed value and optional
/// auxiliary covariates used as external drift terms.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePoint {
    pub position: Point2<f64>,
    pub value: f64,
    pub covariates: Vec<f64>,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            value,
            covariates: Vec::new(),
        }
    }

    pub fn with_covariates(x: f64, y: f64, value: f64, covariates: Vec<f64>) -> Self {
        Self {
            position: Point2::new(x, y),
            value,
            covariates,
        }
    }

    #[inline(always)]
    pub fn x(&self) -> f64 {
        self.position.x
    }

    #[inline(always)]
    pub fn y(&self) -> f64 {
        self.position.y
    }

    /// Euclidean distance to another location.
    #[inline(always)]
    pub fn distance_to(&self, point: &Point2<f64>) -> f64 {
        nalgebra::distance(&self.position, point)
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.position.x.is_finite()
            && self.position.y.is_finite()
            && self.value.is_finite()
            && self.covariates.iter().all(|c| c.is_finite())
    }
}
