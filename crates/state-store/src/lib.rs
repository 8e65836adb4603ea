//! Durable keyed state store for the order enrichment processor.
//!
//! This crate provides the partition-scoped storage layer:
//! - [`Changelog`] trait for the append-only mutation log, with an
//!   in-memory implementation for tests
//! - [`ShardStore`] for point lookups and write-ahead upserts per logical
//!   table, rebuilt from the change log on restart or ownership transfer
//! - [`Checkpoint`] capturing a shard's state at a change-log position

pub mod changelog;
pub mod checkpoint;
pub mod error;
pub mod shard;

pub use changelog::{
    Changelog, ChangelogEntry, ChangelogStream, InMemoryChangelog, Mutation, Sequence,
};
pub use checkpoint::Checkpoint;
pub use error::{Result, StoreError};
pub use shard::ShardStore;
