//! The tile surface and everything placed on it

pub mod objects;
pub mod surface;

pub use objects::*;
pub use surface::{line_points, rotate_point, MapSurface};
