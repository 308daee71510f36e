use thiserror::Error;

/// Errors that can occur when accessing the event store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when running windowed queries
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid time range: from {from} is after to {to}")]
    InvalidRange {
        from: crate::events::Timestamp,
        to: crate::events::Timestamp,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors that can occur during configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Errors surfaced by the monitor's ingestion API
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Rejected event: {0}")]
    InvalidEvent(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
