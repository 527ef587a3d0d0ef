//! Error type shared by the Melixa crates

use thiserror::Error;

/// Result alias for melixa-common operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bootstrap errors: reading configuration and setting up logging
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file missing when explicitly requested, malformed, or out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tracing subscriber could not be installed
    #[error("Logging setup error: {0}")]
    Logging(String),
}
