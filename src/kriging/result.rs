/// Kriging estimate at one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub value: f64,
    pub variance: f64,
}

impl Prediction {
    pub fn new(value: f64, variance: f64) -> Self {
        Self { value, variance }
    }

    /// Placeholder for a target whose neighbourhood is too small to solve.
    pub fn missing() -> Self {
        Self {
            value: f64::NAN,
            variance: f64::NAN,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_nan()
    }

    pub fn standard_error(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Predictions aligned with the targets of the grid they were computed for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KrigingResult {
    pub predictions: Vec<Prediction>,
}

impl KrigingResult {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.predictions.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.predictions.iter().map(|p| p.value).collect()
    }

    pub fn variances(&self) -> Vec<f64> {
        self.predictions.iter().map(|p| p.variance).collect()
    }

    pub fn standard_errors(&self) -> Vec<f64> {
        self.predictions.iter().map(Prediction::standard_error).collect()
    }

    pub fn n_missing(&self) -> usize {
        self.predictions.iter().filter(|p| p.is_missing()).count()
    }
}

impl FromIterator<Prediction> for KrigingResult {
    fn from_iter<T: IntoIterator<Item = Prediction>>(iter: T) -> Self {
        Self {
            predictions: iter.into_iter().collect(),
        }
    }
}
