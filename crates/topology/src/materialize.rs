//! Reference table materializer.

use std::marker::PhantomData;

use async_trait::async_trait;
use domain::{ReferenceRecord, decode};
use state_store::Mutation;

use crate::error::{Result, TopologyError};
use crate::stage::{Stage, StageOutput};
use crate::transport::ConsumedRecord;

/// Materializes a compacted reference stream into its local table.
///
/// A document upserts `key → document`; a tombstone (null payload)
/// removes the key. Last-write-wins per key: the table only ever reflects
/// the latest value. No downstream emission.
pub struct TableMaterializer<R> {
    _record: PhantomData<fn() -> R>,
}

impl<R> TableMaterializer<R> {
    /// Creates a materializer for the reference record type `R`.
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<R> Default for TableMaterializer<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: ReferenceRecord + 'static> Stage for TableMaterializer<R> {
    fn name(&self) -> &'static str {
        R::table()
    }

    async fn process(&self, record: &ConsumedRecord) -> Result<StageOutput> {
        let mut output = StageOutput::none();

        if record.value.is_null() {
            tracing::debug!(table = R::table(), key = %record.key, "tombstone");
            metrics::counter!("table_tombstones_total").increment(1);
            output.mutations.push(Mutation::delete(R::table(), &record.key));
            return Ok(output);
        }

        // Field-presence check only; the table keeps the document exactly
        // as received, extra fields included.
        decode::<R>(R::record_type(), &record.value).map_err(|source| TopologyError::Malformed {
            channel: record.channel.clone(),
            source,
        })?;

        metrics::counter!("table_upserts_total").increment(1);
        output
            .mutations
            .push(Mutation::put(R::table(), &record.key, record.value.clone()));
        Ok(output)
    }
}
