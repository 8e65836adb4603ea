//! Stage contract: a record in, staged side effects out.

use async_trait::async_trait;
use state_store::Mutation;

use crate::error::Result;
use crate::transport::{ConsumedRecord, Emit};

/// Side effects staged by processing one input record.
///
/// Nothing here is visible yet; the output coordinator makes the
/// mutations durable before any emission is published and before the
/// input offset advances.
#[derive(Debug, Default)]
pub struct StageOutput {
    /// Keyed state-store mutations, applied as one atomic batch.
    pub mutations: Vec<Mutation>,

    /// Downstream publications, in emission order.
    pub emits: Vec<Emit>,
}

impl StageOutput {
    /// An output with no side effects.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if the output carries no side effects.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.emits.is_empty()
    }
}

/// A processing stage of the topology.
///
/// Stages are pure with respect to external visibility: they may read
/// the partition's state store but stage all writes and emissions in the
/// returned [`StageOutput`]. A stage is invoked sequentially per
/// partition, record *n+1* only after record *n*'s commit.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Returns the name of this stage, for logs and metrics.
    fn name(&self) -> &'static str;

    /// Processes one input record.
    async fn process(&self, record: &ConsumedRecord) -> Result<StageOutput>;
}
