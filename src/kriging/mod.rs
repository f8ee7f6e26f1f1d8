pub mod cross_validation;
pub mod result;
pub mod trend;
pub mod universal_kriging;

pub use cross_validation::{cross_validate, CrossValidation, CrossValidationResidual};
pub use result::{KrigingResult, Prediction};
pub use trend::TrendModel;
pub use universal_kriging::krige;
