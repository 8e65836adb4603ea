//! End-to-end pipeline tests over the in-memory transport.

use std::future::Future;
use std::time::Duration;

use common::channels::{
    CHANNEL_CUSTOMERS, CHANNEL_ORDERS, CHANNEL_ORDERS_ENRICHED, CHANNEL_ORDERS_WITH_PRODUCT,
    CHANNEL_PRODUCTS, TABLE_CUSTOMERS, TABLE_PRODUCTS,
};
use common::{PartitionId, partition_for_key};
use state_store::InMemoryChangelog;
use topology::{ChannelProducer, EnrichmentRuntime, InMemoryTransport, Transport};

const PRODUCT_ID: &str = "ade9da56-d8f6-43ab-a79b-17d9b8091c96";
const CUSTOMER_ID: &str = "c93f7c73-bebf-4738-898e-2ce346f038b6";
const ORDER_ID: &str = "f3183934-b1e2-40f1-b1c6-72453fdb5e5a";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn started_runtime(
    transport: &InMemoryTransport,
) -> EnrichmentRuntime<InMemoryTransport, InMemoryChangelog> {
    let mut runtime = EnrichmentRuntime::new(transport.clone(), |_| InMemoryChangelog::new());
    runtime.start().await.unwrap();
    runtime
}

/// Polls `condition` until it holds or the deadline expires.
async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition().await {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting: {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn product_payload() -> serde_json::Value {
    serde_json::json!({
        "id": PRODUCT_ID,
        "skuCode": 24,
        "description": "Test Product"
    })
}

fn customer_payload() -> serde_json::Value {
    serde_json::json!({
        "id": CUSTOMER_ID,
        "first_name": "Hilary",
        "last_name": "Tipling",
        "email": "htipling6@mit.edu"
    })
}

fn order_payload() -> serde_json::Value {
    serde_json::json!({
        "id": ORDER_ID,
        "customerId": CUSTOMER_ID,
        "items": [{"id": PRODUCT_ID, "quantity": 3}]
    })
}

async fn seed_references(transport: &InMemoryTransport) {
    let producer = transport.producer();
    producer
        .publish(CHANNEL_PRODUCTS, PRODUCT_ID, product_payload())
        .await
        .unwrap();
    producer
        .publish(CHANNEL_CUSTOMERS, CUSTOMER_ID, customer_payload())
        .await
        .unwrap();
}

async fn wait_references_materialized(
    runtime: &EnrichmentRuntime<InMemoryTransport, InMemoryChangelog>,
    partitions: u32,
) {
    let product_shard = runtime.shard(partition_for_key(PRODUCT_ID, partitions));
    wait_until("product materialized", || async {
        product_shard
            .get(TABLE_PRODUCTS, PRODUCT_ID)
            .await
            .unwrap()
            .is_some()
    })
    .await;

    let customer_shard = runtime.shard(partition_for_key(CUSTOMER_ID, partitions));
    wait_until("customer materialized", || async {
        customer_shard
            .get(TABLE_CUSTOMERS, CUSTOMER_ID)
            .await
            .unwrap()
            .is_some()
    })
    .await;
}

#[tokio::test]
async fn order_is_joined_against_the_product_table() {
    init_tracing();
    let transport = InMemoryTransport::new(1);
    let mut runtime = started_runtime(&transport).await;

    seed_references(&transport).await;
    wait_references_materialized(&runtime, 1).await;

    transport
        .producer()
        .publish(CHANNEL_ORDERS, ORDER_ID, order_payload())
        .await
        .unwrap();

    wait_until("item-enriched emission", || async {
        transport.record_count(CHANNEL_ORDERS_WITH_PRODUCT).await == 1
    })
    .await;

    let records = transport.records(CHANNEL_ORDERS_WITH_PRODUCT).await;
    let (key, value) = &records[0];
    assert_eq!(key, ORDER_ID);
    assert_eq!(value["orderId"], ORDER_ID);
    assert_eq!(value["customerId"], CUSTOMER_ID);
    assert_eq!(value["skuCode"], 24);
    assert_eq!(value["description"], "Test Product");
    assert_eq!(value["quantity"], 3);

    runtime.stop().await;
}

#[tokio::test]
async fn redelivered_order_appends_a_second_product_line() {
    init_tracing();
    let transport = InMemoryTransport::new(1);
    let mut runtime = started_runtime(&transport).await;

    seed_references(&transport).await;
    wait_references_materialized(&runtime, 1).await;

    let producer = transport.producer();
    producer
        .publish(CHANNEL_ORDERS, ORDER_ID, order_payload())
        .await
        .unwrap();
    producer
        .publish(CHANNEL_ORDERS, ORDER_ID, order_payload())
        .await
        .unwrap();

    wait_until("two enriched-order emissions", || async {
        transport.record_count(CHANNEL_ORDERS_ENRICHED).await == 2
    })
    .await;

    let records = transport.records(CHANNEL_ORDERS_ENRICHED).await;
    let (_, last) = records.last().unwrap();
    assert_eq!(last["orderId"], ORDER_ID);
    assert_eq!(last["customer"]["first_name"], "Hilary");
    assert_eq!(last["customer"]["email"], "htipling6@mit.edu");
    // Duplicate delivery appends; the document grows.
    assert_eq!(last["products"].as_array().unwrap().len(), 2);

    runtime.stop().await;
}

#[tokio::test]
async fn unknown_product_suppresses_the_item_without_stalling() {
    init_tracing();
    let transport = InMemoryTransport::new(1);
    let mut runtime = started_runtime(&transport).await;

    seed_references(&transport).await;
    wait_references_materialized(&runtime, 1).await;

    let producer = transport.producer();
    producer
        .publish(
            CHANNEL_ORDERS,
            "order-unknown",
            serde_json::json!({
                "id": "order-unknown",
                "customerId": CUSTOMER_ID,
                "items": [{"id": "no-such-product", "quantity": 1}]
            }),
        )
        .await
        .unwrap();
    producer
        .publish(CHANNEL_ORDERS, ORDER_ID, order_payload())
        .await
        .unwrap();

    // The later good order still flows through.
    wait_until("good order joined behind the miss", || async {
        transport.record_count(CHANNEL_ORDERS_WITH_PRODUCT).await == 1
    })
    .await;
    let records = transport.records(CHANNEL_ORDERS_WITH_PRODUCT).await;
    assert_eq!(records[0].0, ORDER_ID);

    runtime.stop().await;
}

#[tokio::test]
async fn item_emission_order_follows_the_order_document() {
    init_tracing();
    let transport = InMemoryTransport::new(1);
    let mut runtime = started_runtime(&transport).await;

    let producer = transport.producer();
    producer
        .publish(CHANNEL_PRODUCTS, PRODUCT_ID, product_payload())
        .await
        .unwrap();
    producer
        .publish(
            CHANNEL_PRODUCTS,
            "8f22a1d0-4c52-44e2-9fd1-1c0b2a3f9c01",
            serde_json::json!({
                "id": "8f22a1d0-4c52-44e2-9fd1-1c0b2a3f9c01",
                "skuCode": 27,
                "description": "Bacardi Mojito"
            }),
        )
        .await
        .unwrap();

    let shard = runtime.shard(partition_for_key(PRODUCT_ID, 1));
    wait_until("products materialized", || async {
        shard.table_len(TABLE_PRODUCTS).await == 2
    })
    .await;

    producer
        .publish(
            CHANNEL_ORDERS,
            ORDER_ID,
            serde_json::json!({
                "id": ORDER_ID,
                "customerId": CUSTOMER_ID,
                "items": [
                    {"id": "8f22a1d0-4c52-44e2-9fd1-1c0b2a3f9c01", "quantity": 5},
                    {"id": PRODUCT_ID, "quantity": 3}
                ]
            }),
        )
        .await
        .unwrap();

    wait_until("both items joined", || async {
        transport.record_count(CHANNEL_ORDERS_WITH_PRODUCT).await == 2
    })
    .await;

    let records = transport.records(CHANNEL_ORDERS_WITH_PRODUCT).await;
    assert_eq!(records[0].1["skuCode"], 27);
    assert_eq!(records[1].1["skuCode"], 24);

    runtime.stop().await;
}

#[tokio::test]
async fn malformed_order_is_skipped_and_the_pipeline_continues() {
    init_tracing();
    let transport = InMemoryTransport::new(1);
    let mut runtime = started_runtime(&transport).await;

    seed_references(&transport).await;
    wait_references_materialized(&runtime, 1).await;

    let producer = transport.producer();
    producer
        .publish(
            CHANNEL_ORDERS,
            "broken",
            serde_json::json!({"id": "broken"}),
        )
        .await
        .unwrap();
    producer
        .publish(CHANNEL_ORDERS, ORDER_ID, order_payload())
        .await
        .unwrap();

    wait_until("good order joined behind the malformed one", || async {
        transport.record_count(CHANNEL_ORDERS_WITH_PRODUCT).await == 1
    })
    .await;
    assert_eq!(
        transport.records(CHANNEL_ORDERS_WITH_PRODUCT).await[0].0,
        ORDER_ID
    );

    runtime.stop().await;
}

#[tokio::test]
async fn null_payload_deletes_the_table_entry() {
    init_tracing();
    let transport = InMemoryTransport::new(1);
    let mut runtime = started_runtime(&transport).await;

    let producer = transport.producer();
    producer
        .publish(CHANNEL_PRODUCTS, PRODUCT_ID, product_payload())
        .await
        .unwrap();

    let shard = runtime.shard(partition_for_key(PRODUCT_ID, 1));
    wait_until("product materialized", || async {
        shard.get(TABLE_PRODUCTS, PRODUCT_ID).await.unwrap().is_some()
    })
    .await;

    producer
        .publish(CHANNEL_PRODUCTS, PRODUCT_ID, serde_json::Value::Null)
        .await
        .unwrap();
    wait_until("product deleted", || async {
        shard.get(TABLE_PRODUCTS, PRODUCT_ID).await.unwrap().is_none()
    })
    .await;

    runtime.stop().await;
}

#[tokio::test]
async fn join_works_across_partitions_via_replicated_reference_tables() {
    init_tracing();
    let transport = InMemoryTransport::new(4);
    let mut runtime = started_runtime(&transport).await;

    seed_references(&transport).await;

    // Every shard materializes the full reference tables, wherever the
    // reference ids hashed, so an order whose id lands on a different
    // partition than its product's id still joins.
    for p in 0..4 {
        let shard = runtime.shard(PartitionId::new(p));
        wait_until("references replicated to every shard", || async {
            shard
                .get(TABLE_PRODUCTS, PRODUCT_ID)
                .await
                .unwrap()
                .is_some()
                && shard
                    .get(TABLE_CUSTOMERS, CUSTOMER_ID)
                    .await
                    .unwrap()
                    .is_some()
        })
        .await;
    }

    transport
        .producer()
        .publish(CHANNEL_ORDERS, ORDER_ID, order_payload())
        .await
        .unwrap();

    wait_until("item joined on the order's partition", || async {
        transport.record_count(CHANNEL_ORDERS_WITH_PRODUCT).await == 1
    })
    .await;
    wait_until("order enriched on the order's partition", || async {
        transport.record_count(CHANNEL_ORDERS_ENRICHED).await == 1
    })
    .await;

    let records = transport.records(CHANNEL_ORDERS_ENRICHED).await;
    let (key, doc) = &records[0];
    assert_eq!(key, ORDER_ID);
    assert_eq!(doc["customer"]["first_name"], "Hilary");
    assert_eq!(doc["products"][0]["quantity"], 3);

    runtime.stop().await;
}

#[tokio::test]
async fn stop_parks_every_worker() {
    init_tracing();
    let transport = InMemoryTransport::new(2);
    let mut runtime = started_runtime(&transport).await;
    assert_eq!(runtime.partitions(), 2);

    runtime.stop().await;

    // Records published after stop stay unprocessed.
    transport
        .producer()
        .publish(CHANNEL_PRODUCTS, PRODUCT_ID, product_payload())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let shard = runtime.shard(partition_for_key(PRODUCT_ID, 2));
    assert!(shard.get(TABLE_PRODUCTS, PRODUCT_ID).await.unwrap().is_none());
}
