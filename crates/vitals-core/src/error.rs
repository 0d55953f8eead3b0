use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReporterError {
    #[error("Failed to serialize payload: {0}")]
    Serialization(String),

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    #[error("Invalid reporter config: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for ReporterError {
    fn from(err: serde_json::Error) -> Self {
        ReporterError::Serialization(err.to_string())
    }
}
