//! Common types and errors for Wrench
//!
//! This crate provides the shared error type, exit codes, logging setup and
//! message sanitizing used across all Wrench components.

pub mod sanitizer;
pub mod telemetry;

use thiserror::Error;

pub use sanitizer::MessageSanitizer;

/// Core error types for Wrench operations
#[derive(Error, Debug)]
pub enum WrenchError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WrenchError>;

/// Process exit codes used by the `wrench` binary
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 101;
