//! `polmeth` library crate.
//!
//! The binary (`polmeth`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (e.g., future report generators, batch runners)
//! - code stays easy to navigate as the lesson collection grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod lessons;
pub mod likelihood;
pub mod math;
pub mod models;
pub mod optim;
pub mod plot;
pub mod report;
pub mod table;
