pub mod grid;
pub mod rtree_point_set;
pub mod sample;

pub use grid::{PredictionGrid, PredictionTarget};
pub use rtree_point_set::point_set::PointSet;
pub use sample::SamplePoint;
