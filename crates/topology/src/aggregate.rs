//! Order aggregator: folds item-enriched events into per-order
//! accumulators.

use async_trait::async_trait;
use common::channels::{CHANNEL_ORDERS_ENRICHED, TABLE_CUSTOMERS, TABLE_ORDER_ACCUMULATORS};
use domain::{ItemEnrichedEvent, OrderAccumulator, decode};
use state_store::{Changelog, Mutation, ShardStore};

use crate::error::{Result, TopologyError};
use crate::stage::{Stage, StageOutput};
use crate::transport::{ConsumedRecord, Emit};

/// Stateful reducer keyed by order id.
///
/// Each item-enriched event loads (or creates) the order's accumulator,
/// attaches the customer on the first mutation where the customer table
/// has the record, appends the product line, and stages the accumulator
/// upsert together with the full enriched-order emission. The
/// coordinator persists the accumulator before the emission is
/// published.
pub struct OrderAggregator<L> {
    store: ShardStore<L>,
}

impl<L: Changelog> OrderAggregator<L> {
    /// Creates the aggregator over a partition's store.
    pub fn new(store: ShardStore<L>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<L: Changelog + Send + Sync + 'static> Stage for OrderAggregator<L> {
    fn name(&self) -> &'static str {
        "order-aggregate"
    }

    #[tracing::instrument(skip(self, record), fields(key = %record.key))]
    async fn process(&self, record: &ConsumedRecord) -> Result<StageOutput> {
        let event: ItemEnrichedEvent =
            decode("item-enriched", &record.value).map_err(|source| TopologyError::Malformed {
                channel: record.channel.clone(),
                source,
            })?;

        let accumulator = self
            .store
            .get_record::<OrderAccumulator>(TABLE_ORDER_ACCUMULATORS, event.order_id.as_str())
            .await?
            .unwrap_or_else(|| {
                metrics::counter!("accumulators_created_total").increment(1);
                OrderAccumulator::for_order(event.order_id.clone(), event.customer_id.clone())
            });

        // The customer is fetched only while unattached; a miss leaves it
        // absent and the next mutation for this order retries. The stored
        // document is attached as-is.
        let customer = if accumulator.customer.is_none() {
            let found = self
                .store
                .get(TABLE_CUSTOMERS, event.customer_id.as_str())
                .await?;
            if found.is_none() {
                tracing::debug!(
                    order_id = %event.order_id,
                    customer_id = %event.customer_id,
                    "customer not in table, attachment deferred"
                );
                metrics::counter!("customer_misses_total").increment(1);
            }
            found
        } else {
            None
        };

        let accumulator = accumulator.apply(&event, customer);

        let mut output = StageOutput::none();
        output.mutations.push(Mutation::put_record(
            TABLE_ORDER_ACCUMULATORS,
            event.order_id.as_str(),
            &accumulator,
        )?);
        output.emits.push(Emit::record(
            CHANNEL_ORDERS_ENRICHED,
            event.order_id.as_str(),
            &accumulator.to_enriched(),
        )?);
        Ok(output)
    }
}
