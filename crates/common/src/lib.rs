//! Shared types for the order enrichment processor.
//!
//! This crate provides the value types used across the pipeline:
//! - String-keyed identifiers for orders, customers, and products
//! - Partition identifiers and the key-to-partition hash
//! - The logical channel and table names of the topology

pub mod channels;
pub mod partition;
pub mod types;

pub use partition::{PartitionId, partition_for_key};
pub use types::{CustomerId, OrderId, ProductId};
