// Fan-out Integration Tests
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

mod common;

use certstream::ct_logs::{decode_entry, CertificateEvent, LogDescriptor};
use certstream::stream::{event_bus, run_fanout, Channel, RecentHistory, SubscriberRegistry};
use common::{mint_certificate, x509_entry};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn events(count: u64) -> Vec<CertificateEvent> {
    let leaf = mint_certificate("fan.example.com", &["fan.example.com", "out.example.com"], false);
    let issuer = mint_certificate("Example Issuing CA", &[], true);
    let entry = x509_entry(&leaf, &[issuer]);
    let log = LogDescriptor::new("https://ct.example.com/fanout", "Fan-out log");

    (0..count)
        .map(|index| decode_entry(&entry, &log, index).unwrap())
        .collect()
}

async fn next_json(receiver: &mut tokio::sync::mpsc::Receiver<certstream::stream::Frame>) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .unwrap()
        .unwrap();
    serde_json::from_str(&frame).unwrap()
}

#[tokio::test]
async fn test_fanout_isolates_stalled_subscriber() {
    let shutdown = CancellationToken::new();
    let (publisher, receiver) = event_bus(16);
    let registry = SubscriberRegistry::new(2, shutdown.clone());
    let history = RecentHistory::new(25);

    let mut full = registry.register("full", Channel::Default).await;
    let mut dns = registry.register("dns", Channel::DnsOnly).await;
    let stalled = registry.register("stalled", Channel::LeafOnly).await;

    let task = tokio::spawn(run_fanout(
        receiver,
        registry.clone(),
        history.clone(),
        shutdown.clone(),
    ));

    for event in events(4) {
        let index = event.cert_index;
        publisher.publish(event, &shutdown).await.unwrap();

        let update = next_json(&mut full.receiver).await;
        assert_eq!(update["data"]["cert_index"], index);
        assert_eq!(update["data"]["chain"].as_array().unwrap().len(), 1);

        let update = next_json(&mut dns.receiver).await;
        assert_eq!(update["data"]["cert_index"], index);
        assert_eq!(
            update["data"]["all_domains"],
            serde_json::json!(["fan.example.com", "out.example.com"])
        );
    }

    // The never-drained queue overflowed on the third update
    assert!(stalled.token.is_cancelled());
    assert!(!full.token.is_cancelled());
    assert_eq!(registry.len().await, 2);

    assert_eq!(history.len(), 4);
    drop(publisher);
    assert_eq!(task.await.unwrap(), 4);
}

#[tokio::test]
async fn test_shutdown_cancels_every_subscriber() {
    let shutdown = CancellationToken::new();
    let registry = SubscriberRegistry::new(4, shutdown.clone());
    let first = registry.register("first", Channel::Default).await;
    let second = registry.register("second", Channel::DnsOnly).await;

    shutdown.cancel();
    registry.close_all().await;

    assert!(first.token.is_cancelled());
    assert!(second.token.is_cancelled());
    assert!(registry.is_empty().await);
}
