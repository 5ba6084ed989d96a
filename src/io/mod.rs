//! Output helpers: CSV/JSON exports of lesson results.

pub mod export;

pub use export::*;
