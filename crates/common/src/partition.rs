//! Partition identifiers and key routing.

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identifier of a partition of the keyed input space.
///
/// Each partition is assigned exclusively to one worker at a time, so all
/// records for a given key are processed sequentially.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PartitionId(u32);

impl PartitionId {
    /// Creates a partition ID from a raw value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw partition number.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the partition number as a usize index.
    pub fn as_index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PartitionId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Maps a record key to a partition.
///
/// The mapping is deterministic, so records with the same key always land
/// on the same partition regardless of which producer routed them.
pub fn partition_for_key(key: &str, partition_count: u32) -> PartitionId {
    debug_assert!(partition_count > 0);
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    PartitionId::new((hasher.finish() % u64::from(partition_count)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_partition() {
        let a = partition_for_key("order-1", 8);
        let b = partition_for_key("order-1", 8);
        assert_eq!(a, b);
    }

    #[test]
    fn partition_within_bounds() {
        for i in 0..100 {
            let key = format!("key-{i}");
            let p = partition_for_key(&key, 4);
            assert!(p.as_u32() < 4);
        }
    }

    #[test]
    fn single_partition_gets_everything() {
        assert_eq!(partition_for_key("anything", 1), PartitionId::new(0));
    }
}
