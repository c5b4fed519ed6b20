//! NATS integration tests
//!
//! These tests require a running NATS server:
//!   nats-server
//!
//! Tests are skipped automatically if NATS is not available.

use a3s_realtime::{
    EventSource, FieldFilter, FilterField, Filters, NatsClient, NatsSource, NatsSourceConfig,
    RawEvent, RealtimeConfig, RealtimeError, RealtimeHub, RealtimeService,
};
use std::time::Duration;

/// Try to connect to NATS. Returns None if server is unavailable.
async fn try_nats_source(suffix: &str) -> Option<NatsSource> {
    let config = NatsSourceConfig {
        url: "nats://127.0.0.1:4222".to_string(),
        subject: format!("test.{}.>", suffix),
        connect_timeout_secs: 1,
        ..Default::default()
    };

    match NatsSource::connect(config).await {
        Ok(source) => Some(source),
        Err(_) => {
            eprintln!("NATS not available, skipping integration test");
            None
        }
    }
}

/// Helper to create a NATS source, or skip the test
macro_rules! nats_source {
    ($suffix:expr) => {
        match try_nats_source($suffix).await {
            Some(s) => s,
            None => return,
        }
    };
}

async fn publish(client: &NatsClient, key: &str, payload: serde_json::Value) {
    client.publish(&RawEvent::new(key, payload)).await.unwrap();
    client.flush().await.unwrap();
}

#[tokio::test]
async fn test_nats_source_receives_events() {
    let mut source = nats_source!("recv");
    let client = source.client().clone();

    publish(
        &client,
        "test.recv.sample.update",
        serde_json::json!({"new": {"subjectName": "Node1"}}),
    )
    .await;

    let event = tokio::time::timeout(Duration::from_secs(5), source.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(event.key, "test.recv.sample.update");
    assert_eq!(event.payload["new"]["subjectName"], "Node1");
    assert_eq!(source.name(), "nats");
}

#[tokio::test]
async fn test_nats_source_reports_invalid_json() {
    let mut source = nats_source!("badjson");
    let client = source.client().clone();

    client
        .nats_client()
        .publish("test.badjson.sample.update", "not json".into())
        .await
        .unwrap();
    client.flush().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), source.next())
        .await
        .unwrap();
    assert!(matches!(result, Err(RealtimeError::MalformedEvent { .. })));
}

#[tokio::test]
async fn test_nats_to_namespace_fan_out() {
    let source = nats_source!("fanout");
    let client = source.client().clone();

    let hub = RealtimeHub::new(&RealtimeConfig::default());
    let filters = Filters::new().with(FilterField::SubjectName, FieldFilter::include(["Node1"]));
    let (_, mut node1) = hub.open_namespace("node1", filters).unwrap();

    let service = RealtimeService::new(source, hub.dispatcher().clone());
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(service.run_until(async {
        let _ = stop_rx.await;
    }));

    publish(
        &client,
        "test.fanout.sample.update",
        serde_json::json!({"new": {"subjectName": "Node2", "v": 1}}),
    )
    .await;
    publish(
        &client,
        "test.fanout.sample.update",
        serde_json::json!({"new": {"subjectName": "Node1", "v": 2}}),
    )
    .await;

    let emission = tokio::time::timeout(Duration::from_secs(5), node1.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(emission.event_name, "test.fanout.sample.update");
    assert_eq!(emission.json().unwrap()["test.fanout.sample.update"]["new"]["v"], 2);

    stop_tx.send(()).unwrap();
    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.received, 2);
    assert_eq!(stats.delivered, 2);
}
