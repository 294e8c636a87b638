//! Conformance engine error types

use thiserror::Error;

/// Errors raised by the conformance engine itself
///
/// Misbehaviour of the technology under test is never reported through this
/// type; it is recorded as evidence instead.
#[derive(Debug, Error)]
pub enum ConformanceError {
    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Event listener failed: {0}")]
    Listener(String),
}

/// Result type for conformance engine operations
pub type Result<T> = std::result::Result<T, ConformanceError>;
