//! Error types for the review pipeline.

use crate::engine::EngineError;

/// Errors that escape a stage and abort the rest of the chain.
///
/// Policy denials and per-image replication failures are not errors; they
/// are recorded on the review itself.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("image engine unavailable: {0}")]
    EngineUnavailable(#[source] EngineError),
}

/// Errors raised while validating configuration at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{} variables are not found! MUST fill these environment variables for REPLICATOR!", missing.join(", "))]
    MissingReplicationSettings { missing: Vec<String> },

    #[error("replication is enabled but no replication target was configured")]
    ReplicationTargetAbsent,

    #[error("invalid engine call timeout: {0}s (must be greater than zero)")]
    InvalidTimeout(u64),
}

/// Result type for stage execution.
pub type StageResult<T> = std::result::Result<T, StageError>;
