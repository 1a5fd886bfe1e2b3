//! Common error types for kiln

use thiserror::Error;

/// Common result type for kiln operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across kiln crates
#[derive(Error, Debug)]
pub enum Error {
    /// Config file exists but could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),
}
