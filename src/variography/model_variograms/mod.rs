use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KrigingError, Result};

use self::iso_circular::IsoCircular;
use self::iso_exponential::IsoExponential;
use self::iso_gaussian::IsoGaussian;
use self::iso_linear::IsoLinear;
use self::iso_nugget::IsoNugget;
use self::iso_spherical::IsoSpherical;

pub mod iso_circular;
pub mod iso_exponential;
pub mod iso_fitter;
pub mod iso_gaussian;
pub mod iso_linear;
pub mod iso_nugget;
pub mod iso_spherical;
pub mod optimizer;

/// Isotropic variogram structure evaluated at a separation distance.
pub trait IsoVariogramModel {
    /// Sill of the structure (semivariance plateau).
    fn c_0(&self) -> f64;
    fn variogram(&self, h: f64) -> f64;

    fn covariogram(&self, h: f64) -> f64 {
        self.c_0() - self.variogram(h)
    }
}

/// Shape family of the correlated structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariogramFamily {
    #[default]
    #[serde(alias = "Sph", alias = "sph")]
    Spherical,
    #[serde(alias = "Exp", alias = "exp")]
    Exponential,
    #[serde(alias = "Gau", alias = "gau")]
    Gaussian,
    #[serde(alias = "Cir", alias = "cir")]
    Circular,
    #[serde(alias = "Lin", alias = "lin")]
    Linear,
}

impl VariogramFamily {
    pub const ALL: [VariogramFamily; 5] = [
        VariogramFamily::Spherical,
        VariogramFamily::Exponential,
        VariogramFamily::Gaussian,
        VariogramFamily::Circular,
        VariogramFamily::Linear,
    ];

    /// Three letter short name (`Sph`, `Exp`, ...).
    pub fn short_name(&self) -> &'static str {
        match self {
            VariogramFamily::Spherical => "Sph",
            VariogramFamily::Exponential => "Exp",
            VariogramFamily::Gaussian => "Gau",
            VariogramFamily::Circular => "Cir",
            VariogramFamily::Linear => "Lin",
        }
    }
}

impl fmt::Display for VariogramFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for VariogramFamily {
    type Err = KrigingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sph" | "spherical" => Ok(VariogramFamily::Spherical),
            "exp" | "exponential" => Ok(VariogramFamily::Exponential),
            "gau" | "gaussian" => Ok(VariogramFamily::Gaussian),
            "cir" | "circular" => Ok(VariogramFamily::Circular),
            "lin" | "linear" => Ok(VariogramFamily::Linear),
            other => Err(KrigingError::Config(format!(
                "unknown variogram family `{other}`"
            ))),
        }
    }
}

/// Correlated structure with a concrete range and partial sill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariogramType {
    IsoSpherical(IsoSpherical),
    IsoExponential(IsoExponential),
    IsoGaussian(IsoGaussian),
    IsoCircular(IsoCircular),
    IsoLinear(IsoLinear),
}

impl VariogramType {
    pub fn new(family: VariogramFamily, range: f64, sill: f64) -> Self {
        match family {
            VariogramFamily::Spherical => Self::IsoSpherical(IsoSpherical::new(range, sill)),
            VariogramFamily::Exponential => Self::IsoExponential(IsoExponential::new(range, sill)),
            VariogramFamily::Gaussian => Self::IsoGaussian(IsoGaussian::new(range, sill)),
            VariogramFamily::Circular => Self::IsoCircular(IsoCircular::new(range, sill)),
            VariogramFamily::Linear => Self::IsoLinear(IsoLinear::new(range, sill)),
        }
    }

    pub fn variogram_dr(&self, h: f64) -> f64 {
        match self {
            VariogramType::IsoSpherical(v) => v.variogram_dr(h),
            VariogramType::IsoExponential(v) => v.variogram_dr(h),
            VariogramType::IsoGaussian(v) => v.variogram_dr(h),
            VariogramType::IsoCircular(v) => v.variogram_dr(h),
            VariogramType::IsoLinear(v) => v.variogram_dr(h),
        }
    }

    pub fn variogram_ds(&self, h: f64) -> f64 {
        match self {
            VariogramType::IsoSpherical(v) => v.variogram_ds(h),
            VariogramType::IsoExponential(v) => v.variogram_ds(h),
            VariogramType::IsoGaussian(v) => v.variogram_ds(h),
            VariogramType::IsoCircular(v) => v.variogram_ds(h),
            VariogramType::IsoLinear(v) => v.variogram_ds(h),
        }
    }
}

impl IsoVariogramModel for VariogramType {
    fn c_0(&self) -> f64 {
        match self {
            VariogramType::IsoSpherical(v) => v.c_0(),
            VariogramType::IsoExponential(v) => v.c_0(),
            VariogramType::IsoGaussian(v) => v.c_0(),
            VariogramType::IsoCircular(v) => v.c_0(),
            VariogramType::IsoLinear(v) => v.c_0(),
        }
    }

    fn variogram(&self, h: f64) -> f64 {
        match self {
            VariogramType::IsoSpherical(v) => v.variogram(h),
            VariogramType::IsoExponential(v) => v.variogram(h),
            VariogramType::IsoGaussian(v) => v.variogram(h),
            VariogramType::IsoCircular(v) => v.variogram(h),
            VariogramType::IsoLinear(v) => v.variogram(h),
        }
    }
}

/// Nugget plus one correlated structure:
/// `γ(0) = 0`, `γ(h) = nugget + psill * shape(h / range)` for `h > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariogramModel {
    pub family: VariogramFamily,
    pub nugget: f64,
    pub psill: f64,
    pub range: f64,
}

impl VariogramModel {
    /// Validated constructor: `nugget >= 0`, `psill >= 0`, `range > 0`.
    pub fn new(family: VariogramFamily, nugget: f64, psill: f64, range: f64) -> Result<Self> {
        if !(nugget.is_finite() && nugget >= 0.0) {
            return Err(KrigingError::invalid(
                "nugget",
                nugget,
                "must be finite and non-negative",
            ));
        }
        if !(psill.is_finite() && psill >= 0.0) {
            return Err(KrigingError::invalid(
                "psill",
                psill,
                "must be finite and non-negative",
            ));
        }
        if !(range.is_finite() && range > 0.0) {
            return Err(KrigingError::invalid(
                "range",
                range,
                "must be finite and strictly positive",
            ));
        }

        Ok(Self {
            family,
            nugget,
            psill,
            range,
        })
    }

    pub fn spherical(nugget: f64, psill: f64, range: f64) -> Result<Self> {
        Self::new(VariogramFamily::Spherical, nugget, psill, range)
    }

    pub fn sill(&self) -> f64 {
        self.nugget + self.psill
    }

    /// `[nugget, psill, range]`.
    pub fn parameters(&self) -> [f64; 3] {
        [self.nugget, self.psill, self.range]
    }

    pub(crate) fn with_parameters(&self, params: [f64; 3]) -> Self {
        Self {
            family: self.family,
            nugget: params[0],
            psill: params[1],
            range: params[2],
        }
    }

    fn nugget_structure(&self) -> IsoNugget {
        IsoNugget::new(self.nugget)
    }

    fn structure(&self) -> VariogramType {
        VariogramType::new(self.family, self.range, self.psill)
    }

    /// Partial derivatives `[dγ/dnugget, dγ/dpsill, dγ/drange]` at `h`.
    pub fn gradient(&self, h: f64) -> [f64; 3] {
        let structure = self.structure();
        [
            self.nugget_structure().variogram_dn(h),
            structure.variogram_ds(h),
            structure.variogram_dr(h),
        ]
    }
}

impl IsoVariogramModel for VariogramModel {
    fn c_0(&self) -> f64 {
        self.sill()
    }

    fn variogram(&self, h: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }
        self.nugget_structure().variogram(h) + self.structure().variogram(h)
    }
}

impl fmt::Display for VariogramModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (nugget = {}, psill = {}, range = {})",
            self.family, self.nugget, self.psill, self.range
        )
    }
}

/// Which of `(nugget, psill, range)` may vary while fitting. Fixed
/// parameters stay pinned at the initial guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterMask {
    pub nugget: bool,
    pub psill: bool,
    pub range: bool,
}

impl ParameterMask {
    pub fn all_free() -> Self {
        Self {
            nugget: true,
            psill: true,
            range: true,
        }
    }

    pub fn all_fixed() -> Self {
        Self {
            nugget: false,
            psill: false,
            range: false,
        }
    }

    /// Indices into `[nugget, psill, range]` of the free parameters.
    pub fn free_indices(&self) -> Vec<usize> {
        [self.nugget, self.psill, self.range]
            .iter()
            .enumerate()
            .filter(|(_, free)| **free)
            .map(|(i, _)| i)
            .collect()
    }
}

impl Default for ParameterMask {
    fn default() -> Self {
        Self::all_free()
    }
}
