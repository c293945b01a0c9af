//! Error types for the metrics core

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building meters and instruments.
///
/// None of these ever reach a caller of the instrument factory: creation
/// failures are logged and replaced by no-op instruments.
#[derive(Error, Debug)]
pub enum Error {
    /// Instrument parameters rejected by the backend
    #[error("Invalid instrument {name}: {reason}")]
    InvalidInstrument { name: String, reason: String },

    /// An instrument with the same name but another kind already exists
    #[error("Instrument {name} already registered as {existing}, requested {requested}")]
    InstrumentConflict {
        name: String,
        existing: String,
        requested: String,
    },

    /// Prometheus registry or encoder error
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Duration parse error
    #[error("Failed to parse duration: {0}")]
    DurationParse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration parse error
    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Push gateway error
    #[error("Push gateway error: {0}")]
    Push(String),

    /// Exposition server error
    #[error("Exposition server error: {0}")]
    Server(String),

    /// No tokio runtime available to spawn background work on
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}
