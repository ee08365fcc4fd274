use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum GatewayError {
    #[error("Malformed request envelope: {0}")]
    #[diagnostic(code(gateway::envelope))]
    Envelope(String),

    #[error("Invalid base64 payload: {0}")]
    #[diagnostic(code(gateway::envelope::base64))]
    Base64(#[from] base64::DecodeError),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(gateway::config), help("check the gateway YAML file"))]
    Config(String),

    #[error("YAML error: {0}")]
    #[diagnostic(code(gateway::config::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid path expression '{expression}': {reason}")]
    #[diagnostic(code(gateway::path))]
    InvalidPath { expression: String, reason: String },

    #[error("Persistence error: {0}")]
    #[diagnostic(code(gateway::persistence))]
    Persistence(String),

    #[error("Message {0} has already been captured")]
    #[diagnostic(code(gateway::persistence::captured))]
    AlreadyCaptured(String),

    #[error("Version conflict for message {message_id}: expected {expected}, got {actual}")]
    #[diagnostic(code(gateway::persistence::version))]
    VersionConflict {
        message_id: String,
        expected: u32,
        actual: u32,
    },

    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    #[diagnostic(code(gateway::persistence::rocksdb))]
    RocksDb(#[from] rocksdb::Error),

    #[error("Publish to '{channel}' failed: {reason}")]
    #[diagnostic(code(gateway::publish))]
    Publish { channel: String, reason: String },

    #[error("Pipeline deadline of {0:?} exceeded")]
    #[diagnostic(code(gateway::timeout), help("the request can be retried"))]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    #[diagnostic(code(gateway::json))]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(gateway::csv))]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(gateway::io))]
    Io(#[from] std::io::Error),

    #[error("Telemetry error: {0}")]
    #[diagnostic(code(gateway::telemetry))]
    Telemetry(String),
}

impl GatewayError {
    /// Whether the caller may resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Timeout(_) | GatewayError::VersionConflict { .. })
    }

    /// Storage-level failures that must surface to the caller.
    pub fn is_persistence(&self) -> bool {
        match self {
            GatewayError::Persistence(_)
            | GatewayError::AlreadyCaptured(_)
            | GatewayError::VersionConflict { .. } => true,
            #[cfg(feature = "storage-rocksdb")]
            GatewayError::RocksDb(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
