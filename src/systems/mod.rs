pub mod lu;
pub mod system_builder;
