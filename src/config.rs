//! Explicit, serialisable configuration with documented defaults.
//!
//! ```toml
//! trend = "linear_coordinates"
//!
//! [binning]
//! cutoff = 150000.0
//! bin_width = 10000.0
//!
//! [variogram]
//! family = "Sph"
//! free = { nugget = true, psill = false, range = false }
//! initial_guess = { nugget = 0.0, psill = 2500.0, range = 100000.0 }
//!
//! [fit]
//! weighting = "pair_count"
//! max_iterations = 200
//!
//! [kriging.neighborhood]
//! kind = "local"
//! max_neighbors = 32
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{KrigingError, Result};
use crate::kriging::trend::TrendModel;
use crate::variography::experimental::VariogramBinning;
use crate::variography::model_variograms::iso_fitter::{FitWeighting, InitialGuess};
use crate::variography::model_variograms::{ParameterMask, VariogramFamily};

/// Optimiser settings for [`fit_variogram_model`](crate::variography::model_variograms::iso_fitter::fit_variogram_model).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub weighting: FitWeighting,
    pub max_iterations: usize,
    /// Relative tolerance on the objective decrease, the step length and
    /// the projected gradient.
    pub tolerance: f64,
    /// Lower bound applied to a free range.
    pub min_range: f64,
    pub initial_damping: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            weighting: FitWeighting::PairCount,
            max_iterations: 200,
            tolerance: 1e-10,
            min_range: 1e-9,
            initial_damping: 1e-3,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(KrigingError::invalid(
                "max_iterations",
                0.0,
                "at least one iteration is required",
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(KrigingError::invalid(
                "tolerance",
                self.tolerance,
                "must be finite and non-negative",
            ));
        }
        if !(self.min_range.is_finite() && self.min_range > 0.0) {
            return Err(KrigingError::invalid(
                "min_range",
                self.min_range,
                "must be finite and strictly positive",
            ));
        }
        if !(self.initial_damping.is_finite() && self.initial_damping > 0.0) {
            return Err(KrigingError::invalid(
                "initial_damping",
                self.initial_damping,
                "must be finite and strictly positive",
            ));
        }
        Ok(())
    }
}

/// Which samples enter each target's kriging system.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchNeighborhood {
    /// Every sample; the system matrix is factorised once for all targets.
    #[default]
    Global,
    /// The `max_neighbors` nearest samples, optionally within `max_distance`.
    Local {
        max_neighbors: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_distance: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrigingConfig {
    /// Smallest admissible ratio between the smallest and largest LU pivot
    /// magnitude before the system is reported singular.
    pub pivot_tolerance: f64,
    pub neighborhood: SearchNeighborhood,
}

impl Default for KrigingConfig {
    fn default() -> Self {
        Self {
            neighborhood: SearchNeighborhood::Global,
            pivot_tolerance: 1e-12,
        }
    }
}

impl KrigingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.pivot_tolerance.is_finite() && self.pivot_tolerance >= 0.0) {
            return Err(KrigingError::invalid(
                "pivot_tolerance",
                self.pivot_tolerance,
                "must be finite and non-negative",
            ));
        }
        if let SearchNeighborhood::Local {
            max_neighbors,
            max_distance,
        } = self.neighborhood
        {
            if max_neighbors == 0 {
                return Err(KrigingError::invalid(
                    "max_neighbors",
                    0.0,
                    "a local neighbourhood needs at least one sample",
                ));
            }
            if let Some(d) = max_distance.filter(|d| !(d.is_finite() && *d > 0.0)) {
                return Err(KrigingError::invalid(
                    "max_distance",
                    d,
                    "must be finite and strictly positive",
                ));
            }
        }
        Ok(())
    }
}

/// Variogram model selection for the end-to-end workflow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariogramSpec {
    pub family: VariogramFamily,
    /// Use the unfitted initial guess when the fit does not converge
    /// instead of failing.
    pub fallback_on_nonconvergence: bool,
    pub free: ParameterMask,
    /// Starting values; derived from the empirical variogram when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_guess: Option<InitialGuess>,
}

impl Default for VariogramSpec {
    fn default() -> Self {
        Self {
            family: VariogramFamily::Spherical,
            free: ParameterMask::all_free(),
            initial_guess: None,
            fallback_on_nonconvergence: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrakrigeConfig {
    pub trend: TrendModel,
    /// Lag binning; derived from the sample extent when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binning: Option<VariogramBinning>,
    pub variogram: VariogramSpec,
    pub fit: FitConfig,
    pub kriging: KrigingConfig,
}

impl TerrakrigeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| KrigingError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| KrigingError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(binning) = self.binning {
            VariogramBinning::new(binning.cutoff, binning.bin_width)?;
        }
        if let Some(guess) = self.variogram.initial_guess {
            guess.to_model(self.variogram.family)?;
        }
        self.fit.validate()?;
        self.kriging.validate()
    }
}
