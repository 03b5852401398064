//! Error types for ragdoc

use thiserror::Error;

/// Result type alias using RagError
pub type Result<T> = std::result::Result<T, RagError>;

/// Error type alias for convenience
pub type Error = RagError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
    pub const UNAVAILABLE: i32 = 4;
}

/// Main error type for ragdoc
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown provider id or unusable settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// A locally-loaded backend was invoked but its runtime was not compiled in
    #[error("Provider '{provider}' is unavailable: {hint}")]
    MissingCapability { provider: String, hint: String },

    /// A local backend was used before `ensure_ready` loaded it
    #[error("Provider not ready: {0}")]
    NotReady(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Backend-reported failure during generation or embedding
    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "local-models")]
    #[error("Local model error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Shorthand for a backend failure attributed to `provider`
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DocumentNotFound(_) | Self::ModelNotFound(_) => exit_codes::NOT_FOUND,
            Self::Config(_) | Self::InvalidInput(_) => exit_codes::INVALID_INPUT,
            Self::MissingCapability { .. } | Self::NotReady(_) => exit_codes::UNAVAILABLE,
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}
