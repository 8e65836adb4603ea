//! Partition worker: drives one (channel, partition) sequentially.

use std::time::Duration;

use state_store::Changelog;
use tokio::sync::watch;

use crate::coordinator::OutputCoordinator;
use crate::error::Result;
use crate::stage::{Stage, StageOutput};
use crate::transport::{ChannelConsumer, ChannelProducer};

const DEFAULT_POLL_BATCH: usize = 64;
const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(20);

/// Sequential processing loop for one partition of one channel.
///
/// Processes record *n+1* only after record *n*'s commit has completed,
/// preserving per-key ordering. Malformed records are skipped with their
/// offset advanced; any other error stops the worker so the partition can
/// be reassigned. The worker may be stopped between commits: committed
/// work is durable, uncommitted work is redelivered on restart.
pub struct PartitionWorker<C, S, L, P> {
    consumer: C,
    stage: S,
    coordinator: OutputCoordinator<L, P>,
    shutdown: watch::Receiver<bool>,
    poll_batch: usize,
    idle_backoff: Duration,
}

impl<C, S, L, P> PartitionWorker<C, S, L, P>
where
    C: ChannelConsumer,
    S: Stage,
    L: Changelog,
    P: ChannelProducer,
{
    /// Creates a worker over its consumer, stage, and coordinator.
    pub fn new(
        consumer: C,
        stage: S,
        coordinator: OutputCoordinator<L, P>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            consumer,
            stage,
            coordinator,
            shutdown,
            poll_batch: DEFAULT_POLL_BATCH,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }

    /// Runs until shutdown is signalled or a fatal error occurs.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            stage = self.stage.name(),
            channel = self.consumer.channel(),
            partition = %self.consumer.partition(),
            "partition worker started"
        );

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let batch = self.consumer.poll(self.poll_batch).await?;
            if batch.is_empty() {
                tokio::select! {
                    _ = self.shutdown.changed() => {}
                    _ = tokio::time::sleep(self.idle_backoff) => {}
                }
                continue;
            }

            for record in batch {
                // Stop between commits; the rest of the batch stays
                // uncommitted and is redelivered.
                if *self.shutdown.borrow() {
                    break;
                }

                let offset = record.offset;
                let result = match self.stage.process(&record).await {
                    Ok(output) => self.coordinator.commit(&self.consumer, offset, output).await,
                    Err(err) if !err.is_fatal() => {
                        tracing::warn!(
                            stage = self.stage.name(),
                            channel = self.consumer.channel(),
                            %offset,
                            error = %err,
                            "skipping malformed record"
                        );
                        metrics::counter!("records_skipped_total").increment(1);
                        self.coordinator
                            .commit(&self.consumer, offset, StageOutput::none())
                            .await
                    }
                    Err(err) => Err(err),
                };

                if let Err(err) = result {
                    tracing::error!(
                        stage = self.stage.name(),
                        channel = self.consumer.channel(),
                        partition = %self.consumer.partition(),
                        error = %err,
                        "partition worker stopping, partition needs reassignment"
                    );
                    return Err(err);
                }
                metrics::counter!("records_processed_total").increment(1);
            }
        }

        tracing::info!(
            stage = self.stage.name(),
            channel = self.consumer.channel(),
            partition = %self.consumer.partition(),
            "partition worker stopped"
        );
        Ok(())
    }
}
