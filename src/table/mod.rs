//! In-memory tabular data.
//!
//! - column-oriented `Frame` with typed cells (`frame`)
//! - key uniqueness and inner-join semantics used by every lesson

pub mod frame;

pub use frame::*;
