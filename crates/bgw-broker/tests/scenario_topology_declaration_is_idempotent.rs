//! Scenario: topology declaration is idempotent, conflicts fail loudly.
//!
//! # Invariant under test
//!
//! Every session open re-declares the exchange, queues and bindings. Doing so
//! with identical parameters must be a no-op; doing so with different
//! durability must be an error, not a silent success.

use bgw_broker::{publish_with_fresh_connection, BrokerConnector, BrokerError, MemoryConnector, Topology};
use bgw_schemas::templates;
use serde_json::json;

#[tokio::test]
async fn two_sequential_opens_both_succeed() {
    let broker = MemoryConnector::new();

    for _ in 0..2 {
        let session = broker.open().await.expect("open");
        session.close().await.expect("close");
    }

    assert_eq!(broker.declarations(), 2);
    assert_eq!(broker.declared(), Some(Topology::standard()));
}

#[tokio::test]
async fn redeclare_with_different_durability_is_a_conflict() {
    let broker = MemoryConnector::new();
    broker.open().await.expect("first open").close().await.expect("close");

    let mut transient = Topology::standard();
    transient.exchange.durable = false;
    let other = broker.sharing_broker(transient);

    let err = match other.open().await {
        Ok(_) => panic!("conflicting declaration must fail"),
        Err(e) => e,
    };
    assert!(matches!(err, BrokerError::TopologyConflict(_)), "{err}");
}

#[tokio::test]
async fn routed_queues_follow_bindings() {
    let broker = MemoryConnector::new();

    for key in ["backtest.request", "strategy.upload", "data.request", "file.upload"] {
        let env = templates::custom(None, json!({"key": key}), None);
        assert!(publish_with_fresh_connection(&broker, key, &env).await.unwrap());
    }

    let routed: Vec<(String, Vec<String>)> = broker
        .published()
        .into_iter()
        .map(|m| (m.routing_key, m.routed_to))
        .collect();

    assert_eq!(
        routed,
        vec![
            ("backtest.request".to_string(), vec!["backtest_queue".to_string()]),
            ("strategy.upload".to_string(), vec!["strategy_queue".to_string()]),
            ("data.request".to_string(), vec!["data_queue".to_string()]),
            ("file.upload".to_string(), vec![]),
        ]
    );
}
