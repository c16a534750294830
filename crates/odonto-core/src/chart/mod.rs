//! Periodontal chart derivations: clinical values and plot geometry.

mod clinical;
mod geometry;

pub use clinical::*;
pub use geometry::*;
