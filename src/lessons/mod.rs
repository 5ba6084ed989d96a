//! Lessons: one self-contained analysis pipeline per subcommand.
//!
//! Every lesson follows the same notebook shape: load (or generate, in
//! offline mode), reshape/derive, fit, report/plot, optionally export. Each
//! module splits the pipeline into a pure `analyze` function returning a
//! serializable output struct, and a `run` function that owns printing and
//! file exports. Tests drive `analyze` directly on offline configs.

pub mod mle;
pub mod panel;
pub mod spatial;
pub mod trend;
pub mod turnout;
