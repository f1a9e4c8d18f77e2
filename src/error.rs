//! Custom error types for the supervisor core.
//!
//! `SupervisorError` is the crate-level error type, built with `thiserror`.
//! Monitor internals use `anyhow::Result`; hardware faults there are handled
//! locally (logged and retried), so only failures that cross the crate
//! boundary — settings problems, primarily — are expressed through this
//! enum. A missing settings file is not an error (defaults substitute), but
//! a present file that is not valid JSON is.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, SupervisorError>;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SupervisorError::Io(std::io::Error::other("disk gone"));
        assert_eq!(err.to_string(), "I/O error: disk gone");
    }
}
