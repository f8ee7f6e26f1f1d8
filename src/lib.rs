//! Empirical semivariogram estimation, variogram model fitting and
//! universal kriging of scalar point observations on a planar projected
//! coordinate system.

pub mod config;
pub mod error;
pub mod kriging;
pub mod spatial_database;
pub mod systems;
pub mod variography;
pub mod workflow;

pub use error::{KrigingError, Result};

pub mod prelude {

    pub mod re_exports {
        pub use nalgebra;
        pub use rstar;
    }

    pub use crate::config::{
        FitConfig, KrigingConfig, SearchNeighborhood, TerrakrigeConfig, VariogramSpec,
    };
    pub use crate::error::{KrigingError, Result};
    pub use crate::kriging::{
        cross_validate, krige, CrossValidation, KrigingResult, Prediction, TrendModel,
    };
    pub use crate::spatial_database::{PointSet, PredictionGrid, PredictionTarget, SamplePoint};
    pub use crate::variography::experimental::{
        estimate_empirical_variogram, EmpiricalVariogram, LagBin, VariogramBinning,
    };
    pub use crate::variography::model_variograms::{
        iso_fitter::{fit_variogram_model, FitWeighting, FittedVariogram, InitialGuess},
        optimizer::fit_variogram_with_restarts,
        ParameterMask, VariogramFamily, VariogramModel,
    };
    pub use crate::workflow::{interpolate, Interpolation};
}
