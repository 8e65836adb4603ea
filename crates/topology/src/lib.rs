//! Stream-to-table join and aggregation topology for order enrichment.
//!
//! This crate wires the processing stages over the transport and storage
//! collaborators:
//! - [`Transport`]/[`ChannelConsumer`]/[`ChannelProducer`] abstract the
//!   message transport; [`InMemoryTransport`] implements them for tests
//! - [`TableMaterializer`] keeps the reference tables current,
//!   [`ItemJoinStage`] joins order items against the product table,
//!   [`OrderAggregator`] folds item-enriched events into per-order
//!   accumulators
//! - [`OutputCoordinator`] commits store mutations, publications, and
//!   offset advancement in that order
//! - [`PartitionWorker`] drives one (channel, partition) sequentially;
//!   [`EnrichmentRuntime`] owns the shards and workers and exposes the
//!   start/stop lifecycle

pub mod aggregate;
pub mod coordinator;
pub mod error;
pub mod join;
pub mod materialize;
pub mod memory;
pub mod runtime;
pub mod stage;
pub mod transport;
pub mod worker;

pub use aggregate::OrderAggregator;
pub use coordinator::OutputCoordinator;
pub use error::{Result, TopologyError};
pub use join::ItemJoinStage;
pub use materialize::TableMaterializer;
pub use memory::InMemoryTransport;
pub use runtime::EnrichmentRuntime;
pub use stage::{Stage, StageOutput};
pub use transport::{ChannelConsumer, ChannelProducer, ConsumedRecord, Emit, Offset, Transport};
pub use worker::PartitionWorker;
