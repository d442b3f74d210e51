//! Common error types for dlmig

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for dlmig operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across dlmig tools
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required permission bits could not be applied to a path
    #[error("Permission error: could not set mode {mode:#o} on {path}")]
    Permission {
        path: PathBuf,
        mode: u32,
    },

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
