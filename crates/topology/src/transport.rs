//! Transport collaborator contract.
//!
//! The pipeline consumes from and produces to named logical channels; the
//! transport client itself (broker protocol, partition assignment,
//! serialization) lives outside this crate.

use async_trait::async_trait;
use common::PartitionId;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Position of a record within one partition of a channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Offset(u64);

impl Offset {
    /// Creates an offset from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw offset value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the next offset.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record delivered by the transport.
#[derive(Debug, Clone)]
pub struct ConsumedRecord {
    /// Channel the record was consumed from.
    pub channel: String,

    /// Partition within the channel.
    pub partition: PartitionId,

    /// Position within the partition.
    pub offset: Offset,

    /// Record key (UTF-8 string).
    pub key: String,

    /// Record payload as a JSON document.
    pub value: serde_json::Value,
}

/// A staged downstream publication.
#[derive(Debug, Clone)]
pub struct Emit {
    /// Destination channel.
    pub channel: &'static str,

    /// Record key.
    pub key: String,

    /// Record payload.
    pub value: serde_json::Value,
}

impl Emit {
    /// Creates an emission from a serializable record.
    pub fn record<T: Serialize>(
        channel: &'static str,
        key: impl Into<String>,
        record: &T,
    ) -> Result<Self> {
        Ok(Self {
            channel,
            key: key.into(),
            value: serde_json::to_value(record)?,
        })
    }
}

/// Consumes one partition of one channel.
///
/// Records are delivered in offset order; a record is redelivered until
/// its offset has been committed (at-least-once).
#[async_trait]
pub trait ChannelConsumer: Send + Sync {
    /// The channel this consumer reads.
    fn channel(&self) -> &str;

    /// The partition this consumer reads.
    fn partition(&self) -> PartitionId;

    /// Fetches the next batch of uncommitted records, up to `max_records`.
    ///
    /// Returns an empty batch when no input is available.
    async fn poll(&self, max_records: usize) -> Result<Vec<ConsumedRecord>>;

    /// Advances the committed position past `offset`.
    async fn commit(&self, offset: Offset) -> Result<()>;
}

/// Publishes records to downstream channels.
#[async_trait]
pub trait ChannelProducer: Send + Sync {
    /// Publishes one keyed record.
    async fn publish(&self, channel: &str, key: &str, value: serde_json::Value) -> Result<()>;
}

/// Factory for per-partition consumers and shared producers.
pub trait Transport: Clone + Send + Sync + 'static {
    type Consumer: ChannelConsumer + Send + Sync + 'static;
    type Producer: ChannelProducer + Clone + Send + Sync + 'static;

    /// Number of partitions of the keyed input space.
    fn partitions(&self) -> u32;

    /// Creates a consumer for one (channel, partition) with its own
    /// committed position.
    fn consumer(&self, channel: &str, partition: PartitionId) -> Self::Consumer;

    /// Creates a producer handle.
    fn producer(&self) -> Self::Producer;
}
