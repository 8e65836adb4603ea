//! In-memory transport for tests.
//!
//! Routes published records to partitions by key hash and gives every
//! consumer its own committed cursor, so uncommitted records are
//! redelivered on the next poll exactly like a real at-least-once
//! transport.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{PartitionId, partition_for_key};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::transport::{ChannelConsumer, ChannelProducer, ConsumedRecord, Offset, Transport};

// channel -> partition index -> (key, value) in publish order
type Channels = HashMap<String, Vec<Vec<(String, serde_json::Value)>>>;

/// In-memory transport implementation.
#[derive(Clone)]
pub struct InMemoryTransport {
    partition_count: u32,
    channels: Arc<RwLock<Channels>>,
}

impl InMemoryTransport {
    /// Creates a transport with the given partition count.
    pub fn new(partition_count: u32) -> Self {
        assert!(partition_count > 0, "partition count must be positive");
        Self {
            partition_count,
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns every record on a channel, partitions concatenated in
    /// order. Test convenience; does not consume.
    pub async fn records(&self, channel: &str) -> Vec<(String, serde_json::Value)> {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of records on a channel across all partitions.
    pub async fn record_count(&self, channel: &str) -> usize {
        self.records(channel).await.len()
    }
}

/// Producer handle for the in-memory transport.
#[derive(Clone)]
pub struct InMemoryProducer {
    partition_count: u32,
    channels: Arc<RwLock<Channels>>,
}

#[async_trait]
impl ChannelProducer for InMemoryProducer {
    async fn publish(&self, channel: &str, key: &str, value: serde_json::Value) -> Result<()> {
        let partition = partition_for_key(key, self.partition_count);
        let mut channels = self.channels.write().await;
        let partitions = channels
            .entry(channel.to_string())
            .or_insert_with(|| vec![Vec::new(); self.partition_count as usize]);
        partitions[partition.as_index()].push((key.to_string(), value));
        Ok(())
    }
}

/// Consumer of one (channel, partition) with its own committed cursor.
pub struct InMemoryConsumer {
    channels: Arc<RwLock<Channels>>,
    channel: String,
    partition: PartitionId,
    // Index of the next record to deliver after the last commit.
    position: Arc<RwLock<u64>>,
}

#[async_trait]
impl ChannelConsumer for InMemoryConsumer {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn partition(&self) -> PartitionId {
        self.partition
    }

    async fn poll(&self, max_records: usize) -> Result<Vec<ConsumedRecord>> {
        let channels = self.channels.read().await;
        let position = *self.position.read().await;

        let Some(records) = channels
            .get(&self.channel)
            .and_then(|partitions| partitions.get(self.partition.as_index()))
        else {
            return Ok(Vec::new());
        };

        let batch = records
            .iter()
            .enumerate()
            .skip(position as usize)
            .take(max_records)
            .map(|(index, (key, value))| ConsumedRecord {
                channel: self.channel.clone(),
                partition: self.partition,
                offset: Offset::new(index as u64),
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        Ok(batch)
    }

    async fn commit(&self, offset: Offset) -> Result<()> {
        let mut position = self.position.write().await;
        *position = offset.next().as_u64();
        Ok(())
    }
}

impl Transport for InMemoryTransport {
    type Consumer = InMemoryConsumer;
    type Producer = InMemoryProducer;

    fn partitions(&self) -> u32 {
        self.partition_count
    }

    fn consumer(&self, channel: &str, partition: PartitionId) -> Self::Consumer {
        InMemoryConsumer {
            channels: Arc::clone(&self.channels),
            channel: channel.to_string(),
            partition,
            position: Arc::new(RwLock::new(0)),
        }
    }

    fn producer(&self) -> Self::Producer {
        InMemoryProducer {
            partition_count: self.partition_count,
            channels: Arc::clone(&self.channels),
        }
    }
}
