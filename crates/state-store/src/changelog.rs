//! Append-only change log backing the keyed state store.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{Result, StoreError};

/// Position in a shard's change log.
///
/// Sequences start at 1 for the first entry; [`Sequence::initial`] (0)
/// denotes an empty log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(u64);

impl Sequence {
    /// Creates a sequence from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the initial sequence (0) of an empty log.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next sequence.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw sequence value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A single keyed mutation against a logical table.
///
/// `value: None` is a tombstone, removing the key from the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Logical table the mutation targets.
    pub table: String,

    /// Key within the table.
    pub key: String,

    /// New document for the key, or `None` to delete it.
    pub value: Option<serde_json::Value>,
}

impl Mutation {
    /// Creates an upsert mutation from a raw JSON document.
    pub fn put(table: impl Into<String>, key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            value: Some(value),
        }
    }

    /// Creates an upsert mutation from a serializable record.
    pub fn put_record<T: Serialize>(
        table: impl Into<String>,
        key: impl Into<String>,
        record: &T,
    ) -> Result<Self> {
        Ok(Self::put(table, key, serde_json::to_value(record)?))
    }

    /// Creates a delete mutation (tombstone).
    pub fn delete(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            value: None,
        }
    }

    /// Returns true if this mutation removes the key.
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}

/// A committed change-log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogEntry {
    /// Position of this entry in the log.
    pub sequence: Sequence,

    /// The mutation that was applied.
    pub mutation: Mutation,

    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
}

/// A stream of change-log entries, oldest first.
pub type ChangelogStream = Pin<Box<dyn Stream<Item = Result<ChangelogEntry>> + Send>>;

/// Validates a mutation batch before it is appended.
pub fn validate_mutations_for_append(mutations: &[Mutation]) -> Result<()> {
    if mutations.is_empty() {
        return Err(StoreError::InvalidMutation(
            "cannot append an empty mutation batch".to_string(),
        ));
    }
    for mutation in mutations {
        if mutation.table.is_empty() {
            return Err(StoreError::InvalidMutation(
                "mutation has an empty table name".to_string(),
            ));
        }
        if mutation.key.is_empty() {
            return Err(StoreError::InvalidMutation(
                "mutation has an empty key".to_string(),
            ));
        }
    }
    Ok(())
}

/// Core trait for change-log implementations.
///
/// The change log is the durability boundary of the store: a mutation is
/// committed once its append has returned. Implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait Changelog: Send + Sync {
    /// Appends a batch of mutations atomically.
    ///
    /// Returns the sequence of the last appended entry.
    async fn append(&self, mutations: Vec<Mutation>) -> Result<Sequence>;

    /// Streams entries with a sequence strictly greater than `after`.
    ///
    /// Entries are yielded in sequence order.
    async fn replay_after(&self, after: Sequence) -> Result<ChangelogStream>;

    /// Returns the sequence of the newest entry, or the initial sequence
    /// for an empty log.
    async fn last_sequence(&self) -> Result<Sequence>;
}

/// In-memory change log for tests.
///
/// Keeps every entry in a shared vector and is cheap to clone, matching
/// the durability contract of a real log within a single process.
#[derive(Clone, Default)]
pub struct InMemoryChangelog {
    entries: Arc<RwLock<Vec<ChangelogEntry>>>,
}

impl InMemoryChangelog {
    /// Creates a new empty change log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries in the log.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl Changelog for InMemoryChangelog {
    async fn append(&self, mutations: Vec<Mutation>) -> Result<Sequence> {
        validate_mutations_for_append(&mutations)?;

        let mut entries = self.entries.write().await;
        let mut sequence = Sequence::new(entries.len() as u64);
        let timestamp = Utc::now();
        for mutation in mutations {
            sequence = sequence.next();
            entries.push(ChangelogEntry {
                sequence,
                mutation,
                timestamp,
            });
        }
        Ok(sequence)
    }

    async fn replay_after(&self, after: Sequence) -> Result<ChangelogStream> {
        use futures_util::stream;

        let entries = self.entries.read().await;
        let replay: Vec<_> = entries
            .iter()
            .filter(|e| e.sequence > after)
            .cloned()
            .collect();
        Ok(Box::pin(stream::iter(replay.into_iter().map(Ok))))
    }

    async fn last_sequence(&self) -> Result<Sequence> {
        let entries = self.entries.read().await;
        Ok(entries
            .last()
            .map(|e| e.sequence)
            .unwrap_or_else(Sequence::initial))
    }
}
