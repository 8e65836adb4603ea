//! Topology error taxonomy.

use domain::DomainError;
use state_store::StoreError;
use thiserror::Error;

/// Errors that can occur while processing records through the topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The state store failed.
    ///
    /// A change-log append failure means the partition can no longer be
    /// considered durable; the worker stops and surfaces reassignment.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// An input document is missing a required field.
    ///
    /// Non-fatal: the record is skipped, reported, and the stream
    /// continues with the next record.
    #[error("malformed record on '{channel}': {source}")]
    Malformed {
        channel: String,
        #[source]
        source: DomainError,
    },

    /// Downstream publication kept failing after bounded retries.
    ///
    /// The upstream offset is held back so the input is redelivered.
    #[error("publish to '{channel}' failed after {attempts} attempts: {reason}")]
    PublishExhausted {
        channel: String,
        attempts: usize,
        reason: String,
    },

    /// The transport collaborator failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A serialization error occurred while building an output document.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TopologyError {
    /// Whether this error stops the partition.
    ///
    /// Only malformed input is skippable; every other kind means the
    /// current input must not be committed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TopologyError::Malformed { .. })
    }
}

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;
