//! Runtime lifecycle: shard restore, worker spawn, graceful stop.

use common::PartitionId;
use common::channels::{
    CHANNEL_CUSTOMERS, CHANNEL_ORDERS, CHANNEL_ORDERS_WITH_PRODUCT, CHANNEL_PRODUCTS,
};
use domain::{CustomerRecord, ProductRecord};
use state_store::{Changelog, ShardStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::aggregate::OrderAggregator;
use crate::coordinator::OutputCoordinator;
use crate::error::Result;
use crate::join::ItemJoinStage;
use crate::materialize::TableMaterializer;
use crate::stage::Stage;
use crate::transport::Transport;
use crate::worker::PartitionWorker;

/// Owns the shards and partition workers of the enrichment topology.
///
/// Per partition, the item join stage runs on the orders channel and the
/// order aggregator on the orders-with-product channel; both look up
/// reference data in the shard of the *order's* partition. The compacted
/// reference streams are therefore replicated: every shard runs a
/// materializer worker per source partition of the products and
/// customers channels, so each shard holds the full reference tables and
/// lookups never depend on where a reference id hashed. All workers of a
/// partition share its shard; no worker blocks on another partition's
/// progress.
///
/// [`EnrichmentRuntime::start`] restores every shard from its change log
/// before any worker is spawned, so lookups are never served from a
/// partially rebuilt table. [`EnrichmentRuntime::stop`] lets in-flight
/// commits finish, then parks the workers; uncommitted input is left for
/// redelivery.
pub struct EnrichmentRuntime<T: Transport, L> {
    transport: T,
    shards: Vec<ShardStore<L>>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<Result<()>>>,
}

impl<T, L> EnrichmentRuntime<T, L>
where
    T: Transport,
    L: Changelog + Clone + Send + Sync + 'static,
{
    /// Creates the runtime with one shard per transport partition.
    ///
    /// `changelog_for` supplies each partition's change log, so a
    /// restarted process can hand the same logs back and recover.
    pub fn new(transport: T, mut changelog_for: impl FnMut(PartitionId) -> L) -> Self {
        let shards = (0..transport.partitions())
            .map(|p| {
                let partition = PartitionId::new(p);
                ShardStore::new(partition, changelog_for(partition))
            })
            .collect();
        let (shutdown, _) = watch::channel(false);
        Self {
            transport,
            shards,
            shutdown,
            workers: Vec::new(),
        }
    }

    /// Returns the shard owned by a partition.
    pub fn shard(&self, partition: PartitionId) -> &ShardStore<L> {
        &self.shards[partition.as_index()]
    }

    /// Number of partitions this runtime processes.
    pub fn partitions(&self) -> u32 {
        self.shards.len() as u32
    }

    /// Restores all shards and spawns the partition workers.
    #[tracing::instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if !self.workers.is_empty() {
            return Ok(());
        }

        for shard in &self.shards {
            shard.restore(None).await?;
        }

        let producer = self.transport.producer();
        let partition_count = self.partitions();
        for index in 0..self.shards.len() {
            let partition = PartitionId::new(index as u32);
            let shard = self.shards[index].clone();

            // Reference tables are replicated into every shard: consume
            // all source partitions of the compacted streams, not just
            // this shard's own slice.
            for source in 0..partition_count {
                let source = PartitionId::new(source);
                self.spawn(
                    source,
                    CHANNEL_PRODUCTS,
                    TableMaterializer::<ProductRecord>::new(),
                    shard.clone(),
                    producer.clone(),
                );
                self.spawn(
                    source,
                    CHANNEL_CUSTOMERS,
                    TableMaterializer::<CustomerRecord>::new(),
                    shard.clone(),
                    producer.clone(),
                );
            }
            self.spawn(
                partition,
                CHANNEL_ORDERS,
                ItemJoinStage::new(shard.clone()),
                shard.clone(),
                producer.clone(),
            );
            self.spawn(
                partition,
                CHANNEL_ORDERS_WITH_PRODUCT,
                OrderAggregator::new(shard.clone()),
                shard,
                producer.clone(),
            );
        }

        tracing::info!(
            partitions = self.partitions(),
            workers = self.workers.len(),
            "enrichment runtime started"
        );
        Ok(())
    }

    fn spawn<S: Stage + 'static>(
        &mut self,
        partition: PartitionId,
        channel: &str,
        stage: S,
        shard: ShardStore<L>,
        producer: T::Producer,
    ) {
        let consumer = self.transport.consumer(channel, partition);
        let coordinator = OutputCoordinator::new(shard, producer);
        let worker = PartitionWorker::new(consumer, stage, coordinator, self.shutdown.subscribe());
        self.workers.push(tokio::spawn(worker.run()));
    }

    /// Signals shutdown and waits for every worker to park.
    ///
    /// Workers finish their in-flight commit first; anything uncommitted
    /// is redelivered to the next owner of the partition.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        for handle in self.workers.drain(..) {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "worker exited with error before shutdown");
                }
                Err(err) => {
                    tracing::error!(error = %err, "worker task panicked");
                }
            }
        }
        tracing::info!("enrichment runtime stopped");
    }
}
