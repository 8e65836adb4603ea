//! Wire records consumed by the pipeline.
//!
//! Field names follow the external JSON contract exactly, including the
//! two legacy snake_case customer fields.

use common::channels::{TABLE_CUSTOMERS, TABLE_PRODUCTS};
use common::{CustomerId, OrderId, ProductId};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// One line of an order: a product reference and a requested quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product reference.
    pub id: ProductId,

    /// Requested quantity.
    pub quantity: u32,
}

/// An incoming order event, keyed by `id` on the orders channel.
///
/// Immutable as received; `id` is the join key for aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Unique order identifier.
    pub id: OrderId,

    /// Customer who placed the order.
    #[serde(rename = "customerId")]
    pub customer_id: CustomerId,

    /// Line items, in submission order.
    pub items: Vec<LineItem>,
}

/// A product reference record from the compacted products stream.
///
/// Last-write-wins per key: a later record with the same id fully
/// replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Unique product identifier.
    pub id: ProductId,

    /// Stock keeping unit code.
    #[serde(rename = "skuCode")]
    pub sku_code: i64,

    /// Human-readable description.
    pub description: String,
}

/// A customer reference record from the compacted customers stream.
///
/// Same last-write-wins semantics as [`ProductRecord`]. The snake_case
/// name fields are part of the legacy wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Unique customer identifier.
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// A record from a compacted reference stream that materializes into a
/// local table.
pub trait ReferenceRecord: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Logical table this record materializes into.
    fn table() -> &'static str;

    /// Type name used in error reporting and logs.
    fn record_type() -> &'static str;
}

impl ReferenceRecord for ProductRecord {
    fn table() -> &'static str {
        TABLE_PRODUCTS
    }

    fn record_type() -> &'static str {
        "product"
    }
}

impl ReferenceRecord for CustomerRecord {
    fn table() -> &'static str {
        TABLE_CUSTOMERS
    }

    fn record_type() -> &'static str {
        "customer"
    }
}
