//! Domain types used throughout the lessons.
//!
//! This module defines:
//!
//! - typed dataset registries (`EconSeries`, `AcsVariable`) that map stable
//!   identifiers to remote series/tables
//! - per-lesson configuration structs derived from CLI flags
//! - small shared value types (`TimeSeries`, `GrowthTransform`)

pub mod types;

pub use types::*;
