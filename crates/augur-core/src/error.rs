use thiserror::Error;

/// Top-level error type for the augur system.
///
/// Subsystem crates define their own error types and convert from
/// `AugurError` where they touch shared concerns (configuration, state).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AugurError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session store error: {0}")]
    Storage(String),

    #[error("Invalid role transition: {from} -> {to}")]
    InvalidRoleTransition { from: String, to: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("API server error: {0}")]
    Api(String),
}

impl From<toml::de::Error> for AugurError {
    fn from(err: toml::de::Error) -> Self {
        AugurError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AugurError {
    fn from(err: toml::ser::Error) -> Self {
        AugurError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AugurError {
    fn from(err: serde_json::Error) -> Self {
        AugurError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for augur core operations.
pub type Result<T> = std::result::Result<T, AugurError>;
