//! Plot rendering.
//!
//! - deterministic ASCII grids for the terminal (`ascii`)
//! - optional static SVG charts (`svg`)

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;
