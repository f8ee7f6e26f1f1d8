use super::IsoVariogramModel;

/// Exponential structure with practical range: 95% of the sill is reached at
/// `range`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IsoExponential {
    pub range: f64,
    pub sill: f64,
}

impl IsoExponential {
    pub fn new(range: f64, sill: f64) -> Self {
        Self { range, sill }
    }

    //derivative of variogram with respect to range
    pub fn variogram_dr(&self, h: f64) -> f64 {
        let r = self.range;

        -self.sill * 3.0 * h * (-3.0 * h / r).exp() / (r * r)
    }

    //derivative of variogram with respect to sill
    pub fn variogram_ds(&self, h: f64) -> f64 {
        1.0 - (-3.0 * h / self.range).exp()
    }
}

impl IsoVariogramModel for IsoExponential {
    fn c_0(&self) -> f64 {
        self.sill
    }

    fn variogram(&self, h: f64) -> f64 {
        self.sill * (1.0 - (-3.0 * h / self.range).exp())
    }
}
