use thiserror::Error;

/// Errors reported by the variogram estimator and the kriging predictor.
///
/// Every variant carries enough context for the caller to decide what to do
/// next (drop a parameter, deduplicate samples, retry the fit from another
/// starting point). Nothing here is retried internally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KrigingError {
    /// Too few samples, distinct positions, or non-empty lag bins.
    #[error("insufficient data for {context}: need at least {required}, got {provided}")]
    InsufficientData {
        context: &'static str,
        required: usize,
        provided: usize,
    },

    /// A numeric parameter lies outside its admissible domain.
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// The variogram fitter hit its iteration budget.
    #[error("variogram fit did not converge after {iterations} iterations (weighted SSE = {sse})")]
    NonConvergence { iterations: usize, sse: f64 },

    /// The augmented kriging matrix could not be factorised.
    #[error(
        "kriging system is singular (pivot ratio {pivot_ratio:e}); remove coincident or collinear samples"
    )]
    SingularSystem { pivot_ratio: f64 },

    /// Configuration text could not be parsed or serialised.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl KrigingError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, KrigingError>;
