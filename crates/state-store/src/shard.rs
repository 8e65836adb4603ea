//! Partition-scoped keyed store with write-ahead change logging.

use std::collections::HashMap;
use std::sync::Arc;

use common::PartitionId;
use futures_util::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::changelog::{Changelog, Mutation, Sequence, validate_mutations_for_append};
use crate::checkpoint::Checkpoint;
use crate::error::{Result, StoreError};

struct ShardState {
    tables: HashMap<String, HashMap<String, serde_json::Value>>,
    last_applied: Sequence,
    ready: bool,
}

impl ShardState {
    fn apply(&mut self, mutation: &Mutation) {
        match &mutation.value {
            Some(value) => {
                self.tables
                    .entry(mutation.table.clone())
                    .or_default()
                    .insert(mutation.key.clone(), value.clone());
            }
            None => {
                if let Some(table) = self.tables.get_mut(&mutation.table) {
                    table.remove(&mutation.key);
                }
            }
        }
    }
}

/// Keyed store for one partition, scoped per logical table.
///
/// Every mutation is appended to the change log before it is applied to
/// the in-memory view, so a shard can always be rebuilt by replaying the
/// log. A freshly created shard is *not ready*: it must complete
/// [`ShardStore::restore`] before serving lookups, and answers
/// [`StoreError::NotReady`] until then. The shard is owned exclusively by
/// the worker currently assigned its partition.
#[derive(Clone)]
pub struct ShardStore<L> {
    partition: PartitionId,
    log: L,
    state: Arc<RwLock<ShardState>>,
}

impl<L: Changelog> ShardStore<L> {
    /// Creates a shard over the given change log, in the not-ready state.
    pub fn new(partition: PartitionId, log: L) -> Self {
        Self {
            partition,
            log,
            state: Arc::new(RwLock::new(ShardState {
                tables: HashMap::new(),
                last_applied: Sequence::initial(),
                ready: false,
            })),
        }
    }

    /// Returns the partition this shard belongs to.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Returns true once the shard has been restored.
    pub async fn is_ready(&self) -> bool {
        self.state.read().await.ready
    }

    /// Returns the sequence of the last applied change-log entry.
    pub async fn last_applied(&self) -> Sequence {
        self.state.read().await.last_applied
    }

    /// Rebuilds the shard from the change log and marks it ready.
    ///
    /// With a checkpoint, the shard is seeded from the checkpoint's tables
    /// and only the log suffix after the checkpoint is replayed. Must be
    /// called by the new owner after an ownership transfer, before any
    /// lookup is served.
    #[tracing::instrument(skip(self, checkpoint), fields(partition = %self.partition))]
    pub async fn restore(&self, checkpoint: Option<Checkpoint>) -> Result<()> {
        let mut state = self.state.write().await;

        state.tables.clear();
        state.last_applied = Sequence::initial();

        if let Some(checkpoint) = checkpoint {
            if checkpoint.partition != self.partition {
                return Err(StoreError::CheckpointPartitionMismatch {
                    checkpoint: checkpoint.partition,
                    shard: self.partition,
                });
            }
            state.tables = checkpoint.tables;
            state.last_applied = checkpoint.sequence;
        }

        let mut replayed: u64 = 0;
        let mut stream = self.log.replay_after(state.last_applied).await?;
        while let Some(entry) = stream.next().await {
            let entry = entry?;
            state.apply(&entry.mutation);
            state.last_applied = entry.sequence;
            replayed += 1;
        }

        state.ready = true;
        metrics::counter!("store_restores_total").increment(1);
        tracing::info!(
            entries_replayed = replayed,
            last_applied = %state.last_applied,
            "shard restored"
        );
        Ok(())
    }

    /// Applies a mutation batch: change-log append first, then the
    /// in-memory view.
    ///
    /// The batch is committed once this returns; an append failure means
    /// the whole batch is not durable and the error is fatal for the
    /// partition.
    pub async fn apply(&self, mutations: Vec<Mutation>) -> Result<Sequence> {
        validate_mutations_for_append(&mutations)?;

        let mut state = self.state.write().await;
        if !state.ready {
            return Err(StoreError::NotReady {
                partition: self.partition,
            });
        }

        let sequence = self.log.append(mutations.clone()).await?;
        for mutation in &mutations {
            state.apply(mutation);
        }
        state.last_applied = sequence;

        metrics::counter!("store_mutations_total").increment(mutations.len() as u64);
        Ok(sequence)
    }

    /// Upserts a single key.
    pub async fn put(
        &self,
        table: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<Sequence> {
        self.apply(vec![Mutation::put(table, key, value)]).await
    }

    /// Upserts a single key from a serializable record.
    pub async fn put_record<T: Serialize>(
        &self,
        table: impl Into<String>,
        key: impl Into<String>,
        record: &T,
    ) -> Result<Sequence> {
        self.apply(vec![Mutation::put_record(table, key, record)?])
            .await
    }

    /// Removes a single key.
    pub async fn delete(
        &self,
        table: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Sequence> {
        self.apply(vec![Mutation::delete(table, key)]).await
    }

    /// Point lookup of a key's current document.
    ///
    /// Observes the most recently applied mutation for the key; no
    /// consistency guarantee against other keys.
    pub async fn get(&self, table: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let state = self.state.read().await;
        if !state.ready {
            return Err(StoreError::NotReady {
                partition: self.partition,
            });
        }
        Ok(state.tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    /// Point lookup deserialized into a typed record.
    pub async fn get_record<T: DeserializeOwned>(&self, table: &str, key: &str) -> Result<Option<T>> {
        match self.get(table, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Returns the number of keys currently in a table.
    pub async fn table_len(&self, table: &str) -> usize {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .map_or(0, HashMap::len)
    }

    /// Captures a checkpoint of the shard's current state.
    pub async fn checkpoint(&self) -> Result<Checkpoint> {
        let state = self.state.read().await;
        if !state.ready {
            return Err(StoreError::NotReady {
                partition: self.partition,
            });
        }
        Ok(Checkpoint::new(
            self.partition,
            state.last_applied,
            state.tables.clone(),
        ))
    }
}
