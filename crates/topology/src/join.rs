//! Item join stage: order events × product table.

use async_trait::async_trait;
use common::channels::{CHANNEL_ORDERS_WITH_PRODUCT, TABLE_PRODUCTS};
use domain::{OrderEvent, ProductRecord, decode, join_item};
use state_store::{Changelog, ShardStore};

use crate::error::{Result, TopologyError};
use crate::stage::{Stage, StageOutput};
use crate::transport::{ConsumedRecord, Emit};

/// Expands each order event into per-item product joins.
///
/// For every line item, the product table is probed with the item's
/// product id. A hit emits an item-enriched event keyed by the owning
/// order id; a miss suppresses the item without error — the reference
/// record may arrive later, but the item is not buffered or retried.
/// Emission order follows the order's `items` sequence.
pub struct ItemJoinStage<L> {
    store: ShardStore<L>,
}

impl<L: Changelog> ItemJoinStage<L> {
    /// Creates the join stage over a partition's store.
    pub fn new(store: ShardStore<L>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<L: Changelog + Send + Sync + 'static> Stage for ItemJoinStage<L> {
    fn name(&self) -> &'static str {
        "item-join"
    }

    #[tracing::instrument(skip(self, record), fields(key = %record.key))]
    async fn process(&self, record: &ConsumedRecord) -> Result<StageOutput> {
        let order: OrderEvent =
            decode("order", &record.value).map_err(|source| TopologyError::Malformed {
                channel: record.channel.clone(),
                source,
            })?;

        let mut output = StageOutput::none();
        for item in &order.items {
            match self
                .store
                .get_record::<ProductRecord>(TABLE_PRODUCTS, item.id.as_str())
                .await?
            {
                Some(product) => {
                    let enriched = join_item(&order, item, &product);
                    output.emits.push(Emit::record(
                        CHANNEL_ORDERS_WITH_PRODUCT,
                        order.id.as_str(),
                        &enriched,
                    )?);
                    metrics::counter!("items_joined_total").increment(1);
                }
                None => {
                    tracing::debug!(
                        order_id = %order.id,
                        product_id = %item.id,
                        "product not in table, item suppressed"
                    );
                    metrics::counter!("join_misses_total").increment(1);
                }
            }
        }
        Ok(output)
    }
}
