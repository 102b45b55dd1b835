//! Error types for slam2d

use thiserror::Error;

/// Main error type for the SLAM engine
///
/// Degenerate inputs during a scan cycle are not errors; they surface as
/// skipped cycles. This type only covers construction, configuration and I/O.
#[derive(Debug, Error)]
pub enum SlamError {
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Visualization error
    #[error("Visualization error: {0}")]
    Visualization(String),
}

/// Result type alias for SLAM operations
pub type SlamResult<T> = Result<T, SlamError>;
