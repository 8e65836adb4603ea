//! Derived documents and the pure join/reduce transformations.

use common::{CustomerId, OrderId};
use serde::{Deserialize, Serialize};

use crate::records::{LineItem, OrderEvent, ProductRecord};

/// A line item merged with its product reference, keyed by the owning
/// order id on the orders-with-product channel.
///
/// `quantity` is carried from the line item, the product fields from the
/// reference record. `customerId` is threaded through the fan-out so the
/// aggregator can create the accumulator without a secondary order
/// lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEnrichedEvent {
    /// The order this item belongs to.
    #[serde(rename = "orderId")]
    pub order_id: OrderId,

    /// Customer of the originating order.
    #[serde(rename = "customerId")]
    pub customer_id: CustomerId,

    /// Stock keeping unit code from the product record.
    #[serde(rename = "skuCode")]
    pub sku_code: i64,

    /// Description from the product record.
    pub description: String,

    /// Quantity from the line item.
    pub quantity: u32,
}

/// Joins a line item with its product record.
///
/// Pure; the caller is responsible for having resolved `product` from the
/// product table with `item.id`.
pub fn join_item(order: &OrderEvent, item: &LineItem, product: &ProductRecord) -> ItemEnrichedEvent {
    ItemEnrichedEvent {
        order_id: order.id.clone(),
        customer_id: order.customer_id.clone(),
        sku_code: product.sku_code,
        description: product.description.clone(),
        quantity: item.quantity,
    }
}

/// One accumulated product entry of an order document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    #[serde(rename = "skuCode")]
    pub sku_code: i64,
    pub description: String,
    pub quantity: u32,
}

/// Identity of the order an accumulator belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInfo {
    /// The order id (aggregation key).
    pub id: OrderId,

    /// Customer who placed the order.
    #[serde(rename = "customerId")]
    pub customer_id: CustomerId,
}

/// The durable per-order record, keyed by order id.
///
/// Created on the first item-enriched event for an order; every further
/// event appends to `products`. An entry is appended per event, never
/// deduplicated, so a redelivered item produces a repeated entry. The
/// accumulator is never deleted by the pipeline; retention of old
/// accumulators is store policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAccumulator {
    #[serde(rename = "orderInfo")]
    pub order_info: OrderInfo,

    /// Customer document as stored in the customer table, kept verbatim.
    /// Attached on the first mutation where the table has the record;
    /// left absent on a lookup miss and retried on the next mutation.
    pub customer: Option<serde_json::Value>,

    /// Accumulated product entries, in arrival order.
    pub products: Vec<ProductLine>,
}

impl OrderAccumulator {
    /// Creates an empty accumulator for an order.
    pub fn for_order(order_id: OrderId, customer_id: CustomerId) -> Self {
        Self {
            order_info: OrderInfo {
                id: order_id,
                customer_id,
            },
            customer: None,
            products: Vec::new(),
        }
    }

    /// Applies one item-enriched event, producing the next accumulator
    /// state.
    ///
    /// Pure: persistence is a separate step. `customer` is the result of
    /// the caller's customer-table lookup and is only consulted while the
    /// accumulator has no customer attached yet.
    pub fn apply(mut self, event: &ItemEnrichedEvent, customer: Option<serde_json::Value>) -> Self {
        if self.customer.is_none() {
            self.customer = customer;
        }
        self.products.push(ProductLine {
            sku_code: event.sku_code,
            description: event.description.clone(),
            quantity: event.quantity,
        });
        self
    }

    /// Projects the emitted order document from the current state.
    pub fn to_enriched(&self) -> EnrichedOrder {
        EnrichedOrder {
            order_id: self.order_info.id.clone(),
            customer: self.customer.clone(),
            products: self.products.clone(),
        }
    }
}

/// The emitted, non-persisted projection of an [`OrderAccumulator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedOrder {
    #[serde(rename = "orderId")]
    pub order_id: OrderId,
    pub customer: Option<serde_json::Value>,
    pub products: Vec<ProductLine>,
}
