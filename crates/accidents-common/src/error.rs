//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, AccidentsError>;

/// Errors raised by shared infrastructure (configuration, environment, IO)
#[derive(Error, Debug)]
pub enum AccidentsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

impl AccidentsError {
    /// Build an error for an environment variable that failed to parse
    pub fn invalid_env(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidEnv {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Read an environment variable and parse it, falling back to `default` when unset.
///
/// A set-but-unparsable value is an error rather than a silent fallback.
pub fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AccidentsError::invalid_env(name, raw)),
        Err(_) => Ok(default),
    }
}
