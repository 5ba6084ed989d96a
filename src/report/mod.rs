//! Terminal reporting: regression tables and lesson summaries.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

pub mod format;

pub use format::*;
