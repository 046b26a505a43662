//! Error types for the dexpack core library.

use thiserror::Error;

/// Core error type for the packaging pipeline.
#[derive(Error, Debug)]
pub enum DexpackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Project file error: {0}")]
    Project(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("{tool} exited with status {exit_code}: {stderr_tail}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        stderr_tail: String,
    },

    #[error("{tool} exceeded timeout of {timeout_secs} seconds")]
    StageTimeout { tool: String, timeout_secs: u64 },

    #[error("Artifact discovery failed: {0}")]
    ArtifactDiscovery(String),

    #[error("Signing error: {0}")]
    Signing(String),
}

/// Result type alias for dexpack operations.
pub type Result<T> = std::result::Result<T, DexpackError>;
