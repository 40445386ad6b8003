pub mod generation;
pub mod model;
