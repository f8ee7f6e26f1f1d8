use super::IsoVariogramModel;

#[derive(Debug, Clone, Default, Copy, PartialEq)]
pub struct IsoNugget {
    pub nugget: f64,
}

impl IsoNugget {
    pub fn new(nugget: f64) -> Self {
        Self { nugget }
    }

    pub fn variogram_dn(&self, h: f64) -> f64 {
        if h <= 0f64 {
            return 0f64;
        }
        1.0
    }
}

impl IsoVariogramModel for IsoNugget {
    fn c_0(&self) -> f64 {
        self.nugget
    }

    fn variogram(&self, h: f64) -> f64 {
        if h <= 0f64 {
            return 0f64;
        }
        self.nugget
    }
}
