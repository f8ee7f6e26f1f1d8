use std::f64::consts::FRAC_2_PI;

use super::IsoVariogramModel;

#[derive(Debug, Clone, Default, Copy, PartialEq)]
pub struct IsoCircular {
    pub range: f64,
    pub sill: f64,
}

impl IsoCircular {
    pub fn new(range: f64, sill: f64) -> Self {
        Self { range, sill }
    }

    //derivative of variogram with respect to range
    pub fn variogram_dr(&self, h: f64) -> f64 {
        let r = self.range;
        let t = h / r;
        if t >= 1.0 {
            return 0.0;
        }

        -self.sill * 2.0 * FRAC_2_PI * t * (1.0 - t * t).sqrt() / r
    }

    //derivative of variogram with respect to sill
    pub fn variogram_ds(&self, h: f64) -> f64 {
        let t = h / self.range;
        if t >= 1.0 {
            return 1.0;
        }

        1.0 - FRAC_2_PI * t.acos() + FRAC_2_PI * t * (1.0 - t * t).sqrt()
    }
}

impl IsoVariogramModel for IsoCircular {
    fn c_0(&self) -> f64 {
        self.sill
    }

    fn variogram(&self, h: f64) -> f64 {
        self.sill * self.variogram_ds(h)
    }
}
