use super::IsoVariogramModel;

/// Linear structure with a sill: rises linearly and levels off at `range`.
#[derive(Debug, Clone, Default, Copy, PartialEq)]
pub struct IsoLinear {
    pub range: f64,
    pub sill: f64,
}

impl IsoLinear {
    pub fn new(range: f64, sill: f64) -> Self {
        Self { range, sill }
    }

    pub fn variogram_dr(&self, h: f64) -> f64 {
        let r = self.range;
        if h >= r {
            return 0.0;
        }

        -self.sill * h / (r * r)
    }

    pub fn variogram_ds(&self, h: f64) -> f64 {
        (h / self.range).min(1.0)
    }
}

impl IsoVariogramModel for IsoLinear {
    fn c_0(&self) -> f64 {
        self.sill
    }

    fn variogram(&self, h: f64) -> f64 {
        self.sill * self.variogram_ds(h)
    }
}
