pub mod point_set;
