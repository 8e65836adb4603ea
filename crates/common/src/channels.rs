//! Logical channel and table names of the topology.

/// Incoming order events, keyed by order id.
pub const CHANNEL_ORDERS: &str = "orders";

/// Compacted product reference stream, keyed by product id.
pub const CHANNEL_PRODUCTS: &str = "products";

/// Compacted customer reference stream, keyed by customer id.
pub const CHANNEL_CUSTOMERS: &str = "customers";

/// Item-enriched events produced by the join stage, keyed by order id.
pub const CHANNEL_ORDERS_WITH_PRODUCT: &str = "orders-with-product";

/// Fully enriched order documents, keyed by order id.
pub const CHANNEL_ORDERS_ENRICHED: &str = "orders-enriched";

/// Materialized product table, keyed by product id.
pub const TABLE_PRODUCTS: &str = "products";

/// Materialized customer table, keyed by customer id.
pub const TABLE_CUSTOMERS: &str = "customers";

/// Per-order accumulator table, keyed by order id.
pub const TABLE_ORDER_ACCUMULATORS: &str = "order-accumulators";
