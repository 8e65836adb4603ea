use common::PartitionId;
use thiserror::Error;

/// Errors that can occur when interacting with the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The shard has not finished rebuilding from its change log.
    ///
    /// Returned during the ownership-transfer window; callers must treat
    /// this as "not ready", never as an empty lookup result.
    #[error("shard for partition {partition} is not ready")]
    NotReady { partition: PartitionId },

    /// Appending to the change log failed.
    ///
    /// Fatal for the affected partition: state past this point cannot be
    /// considered durable.
    #[error("change log append failed for partition {partition}: {reason}")]
    ChangelogAppend {
        partition: PartitionId,
        reason: String,
    },

    /// A mutation batch failed validation before append.
    #[error("invalid mutation batch: {0}")]
    InvalidMutation(String),

    /// A checkpoint was offered to a shard of a different partition.
    #[error("checkpoint is for partition {checkpoint}, shard owns partition {shard}")]
    CheckpointPartitionMismatch {
        checkpoint: PartitionId,
        shard: PartitionId,
    },

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for state store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
