//! Application error type.
//!
//! Every fallible operation in the crate returns `AppError`, which carries the
//! process exit code alongside a human-readable message:
//!
//! - `2` usage/configuration problems (bad flags, missing API keys)
//! - `3` insufficient data (empty tables, series shorter than the model needs)
//! - `4` runtime/data problems (network failures, malformed responses,
//!   non-finite numerics, non-convergence)

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Usage or configuration error (exit code 2).
    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    /// Insufficient data to proceed (exit code 3).
    pub fn insufficient(message: impl Into<String>) -> Self {
        Self::new(3, message)
    }

    /// Runtime or data error (exit code 4).
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(4, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
