use super::IsoVariogramModel;

#[derive(Debug, Clone, Default, Copy, PartialEq)]
pub struct IsoGaussian {
    pub range: f64,
    pub sill: f64,
}

impl IsoGaussian {
    pub fn new(range: f64, sill: f64) -> Self {
        Self { range, sill }
    }

    //derivative of variogram with respect to range
    pub fn variogram_dr(&self, h: f64) -> f64 {
        let r = self.range;

        -self.sill * (6f64 * h * h * (-3f64 * h * h / (r * r)).exp()) / (r * r * r)
    }

    //derivative of variogram with respect to sill
    pub fn variogram_ds(&self, h: f64) -> f64 {
        let r = self.range;

        1f64 - (-3f64 * h * h / (r * r)).exp()
    }
}

impl IsoVariogramModel for IsoGaussian {
    fn c_0(&self) -> f64 {
        self.sill
    }

    fn variogram(&self, h: f64) -> f64 {
        self.sill * (1.0 - (-3f64 * h * h / (self.range * self.range)).exp())
    }
}
