use thiserror::Error;

use crate::config::ConfigError;
use crate::scan::ScanError;

/// Common error type for the proktologe exporter.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the exporter's Error.
pub type Result<T> = std::result::Result<T, Error>;
