pub mod interpolation;
pub mod points;
pub mod store;
