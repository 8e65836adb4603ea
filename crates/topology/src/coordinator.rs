//! Output coordinator: state mutation, publication, and offset
//! advancement in commit order.

use std::time::Duration;

use state_store::{Changelog, ShardStore};
use uuid::Uuid;

use crate::error::{Result, TopologyError};
use crate::stage::StageOutput;
use crate::transport::{ChannelConsumer, ChannelProducer, Emit, Offset};

const DEFAULT_PUBLISH_ATTEMPTS: usize = 5;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Commits one input record's staged side effects.
///
/// Ordering per commit: (1) state-store mutations become durable via the
/// change-log append, (2) downstream publications go out with bounded
/// retry, (3) the upstream offset advances. A failure before (3) leaves
/// the offset unadvanced, so the input is redelivered and the stage
/// reapplied — at-least-once, with the state transition itself safe to
/// re-run (a redelivered item appends again, which is the documented
/// visible behavior).
pub struct OutputCoordinator<L, P> {
    store: ShardStore<L>,
    producer: P,
    max_publish_attempts: usize,
    retry_delay: Duration,
}

impl<L: Changelog, P: ChannelProducer> OutputCoordinator<L, P> {
    /// Creates a coordinator over a partition's store and a producer.
    pub fn new(store: ShardStore<L>, producer: P) -> Self {
        Self {
            store,
            producer,
            max_publish_attempts: DEFAULT_PUBLISH_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Overrides the publish retry policy.
    pub fn with_publish_retry(mut self, attempts: usize, delay: Duration) -> Self {
        assert!(attempts > 0, "at least one publish attempt is required");
        self.max_publish_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    /// Commits the staged output of one input record.
    #[tracing::instrument(
        skip(self, consumer, output),
        fields(partition = %self.store.partition(), offset = %offset)
    )]
    pub async fn commit<C: ChannelConsumer + ?Sized>(
        &self,
        consumer: &C,
        offset: Offset,
        output: StageOutput,
    ) -> Result<()> {
        let commit_id = Uuid::new_v4();

        if !output.mutations.is_empty() {
            let sequence = self.store.apply(output.mutations).await?;
            tracing::debug!(%commit_id, %sequence, "mutations durable");
        }

        for emit in &output.emits {
            self.publish_with_retry(emit).await?;
        }

        consumer.commit(offset).await?;
        metrics::counter!("commits_total").increment(1);
        tracing::debug!(%commit_id, "commit complete");
        Ok(())
    }

    async fn publish_with_retry(&self, emit: &Emit) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .producer
                .publish(emit.channel, &emit.key, emit.value.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.max_publish_attempts => {
                    tracing::warn!(
                        channel = emit.channel,
                        attempt,
                        error = %err,
                        "publish failed, retrying"
                    );
                    metrics::counter!("publish_retries_total").increment(1);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => {
                    return Err(TopologyError::PublishExhausted {
                        channel: emit.channel.to_string(),
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}
