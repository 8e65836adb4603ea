use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::PartitionId;
use serde::{Deserialize, Serialize};

use crate::Sequence;

/// A durable snapshot of a shard's tables at a change-log position.
///
/// Checkpoints shorten recovery: restore seeds the shard from the
/// checkpoint and replays only the change-log suffix after
/// [`Checkpoint::sequence`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The partition this checkpoint belongs to.
    pub partition: PartitionId,

    /// The change-log position the checkpoint covers, inclusive.
    pub sequence: Sequence,

    /// When the checkpoint was taken.
    pub timestamp: DateTime<Utc>,

    /// The table contents at `sequence`, keyed by table name then key.
    pub tables: HashMap<String, HashMap<String, serde_json::Value>>,
}

impl Checkpoint {
    /// Creates a checkpoint from table contents.
    pub fn new(
        partition: PartitionId,
        sequence: Sequence,
        tables: HashMap<String, HashMap<String, serde_json::Value>>,
    ) -> Self {
        Self {
            partition,
            sequence,
            timestamp: Utc::now(),
            tables,
        }
    }

    /// Returns the number of keys across all tables.
    pub fn key_count(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }
}
