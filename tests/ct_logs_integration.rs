// CT Logs Integration Tests
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Drives the HTTP client, registry loader and per-log watcher against a
// mocked log server.

mod common;

use certstream::ct_logs::{
    CtClient, LogApi, LogDescriptor, LogRegistry, PerLogWatcher, StartPosition, StatsTracker,
    WatcherSettings,
};
use certstream::stream::event_bus;
use certstream::CertstreamError;
use common::{mint_certificate, x509_entry};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> CtClient {
    CtClient::new(Duration::from_secs(5)).unwrap()
}

async fn mount_sth(server: &MockServer, tree_size: u64) {
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-sth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tree_size": tree_size,
            "timestamp": 1_700_000_000_000u64,
            "sha256_root_hash": "AAAA",
        })))
        .mount(server)
        .await;
}

fn entries_json(domains: &[&str]) -> serde_json::Value {
    let entries: Vec<_> = domains
        .iter()
        .map(|domain| {
            let entry = x509_entry(&mint_certificate(domain, &[*domain], false), &[]);
            json!({ "leaf_input": entry.leaf_input, "extra_data": entry.extra_data })
        })
        .collect();
    json!({ "entries": entries })
}

#[tokio::test]
async fn test_client_get_tree_size() {
    let server = MockServer::start().await;
    mount_sth(&server, 123_456).await;

    let size = client().get_tree_size(&server.uri()).await.unwrap();
    assert_eq!(size, 123_456);
}

#[tokio::test]
async fn test_client_get_entries_inclusive_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-entries"))
        .and(query_param("start", "10"))
        .and(query_param("end", "11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries_json(&[
            "a.example.com",
            "b.example.com",
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let entries = client().get_entries(&server.uri(), 10, 11).await.unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_client_retries_rate_limited_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-sth"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_sth(&server, 77).await;

    let size = client().get_tree_size(&server.uri()).await.unwrap();
    assert_eq!(size, 77);
}

#[tokio::test]
async fn test_client_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-sth"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client().get_tree_size(&server.uri()).await.unwrap_err();
    assert!(matches!(err, CertstreamError::Http { status: 404, .. }));
}

#[tokio::test]
async fn test_client_rejects_malformed_sth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-sth"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client().get_tree_size(&server.uri()).await.unwrap_err();
    assert!(matches!(err, CertstreamError::UnexpectedResponse { .. }));
}

#[tokio::test]
async fn test_registry_fetch_v3_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/log_list.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": "3.0",
            "operators": [{
                "name": "Example Operator",
                "logs": [
                    {
                        "description": "Example 'Oak' 2025h1",
                        "url": "https://oak.example.com/2025h1/",
                        "state": { "usable": { "timestamp": "2024-01-01T00:00:00Z" } }
                    },
                    {
                        "description": "Example 'Elm' retired",
                        "url": "https://elm.example.com/",
                        "state": { "retired": { "timestamp": "2023-01-01T00:00:00Z" } }
                    }
                ]
            }]
        })))
        .mount(&server)
        .await;

    let registry =
        LogRegistry::new(format!("{}/log_list.json", server.uri()), Duration::from_secs(5))
            .unwrap();
    let logs = registry.fetch().await.unwrap();

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].url, "https://oak.example.com/2025h1");
    assert_eq!(logs[0].description, "Example 'Oak' 2025h1");
}

#[tokio::test]
async fn test_registry_fetch_failure_is_registry_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/log_list.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let registry =
        LogRegistry::new(format!("{}/log_list.json", server.uri()), Duration::from_secs(5))
            .unwrap();
    let err = registry.fetch().await.unwrap_err();
    assert!(matches!(err, CertstreamError::Registry { .. }));
}

#[tokio::test]
async fn test_watcher_publishes_backfill_in_order() {
    let server = MockServer::start().await;
    mount_sth(&server, 5).await;

    // Block size 2 over [2, 5): chunks [2,3] and [4,4]
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-entries"))
        .and(query_param("start", "2"))
        .and(query_param("end", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries_json(&[
            "two.example.com",
            "three.example.com",
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-entries"))
        .and(query_param("start", "4"))
        .and(query_param("end", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries_json(&["four.example.com"])))
        .expect(1)
        .mount(&server)
        .await;

    let (publisher, mut receiver) = event_bus(16);
    let stats = StatsTracker::new();
    let descriptor = LogDescriptor::new(&server.uri(), "Mock log");
    let settings = WatcherSettings {
        block_size: 2,
        start: StartPosition::BehindHead(3),
        ..WatcherSettings::default()
    };

    let mut watcher = PerLogWatcher::new(
        descriptor.clone(),
        Arc::new(client()),
        settings,
        publisher,
        stats.clone(),
    );

    let cancel = CancellationToken::new();
    watcher.poll_once(&cancel).await.unwrap();
    assert_eq!(watcher.state().last_tree_size(), Some(5));

    let mut seen = Vec::new();
    for _ in 0..3 {
        let event = receiver.recv().await.unwrap();
        seen.push((event.cert_index, event.all_domains()[0].clone()));
    }
    assert_eq!(
        seen,
        vec![
            (2, "two.example.com".to_string()),
            (3, "three.example.com".to_string()),
            (4, "four.example.com".to_string()),
        ]
    );

    let snapshot = stats.get_snapshot();
    assert_eq!(snapshot.total_published, 3);
    let log_stats = &snapshot.per_log[&descriptor.url];
    assert_eq!(log_stats.tree_size, 5);
    assert_eq!(log_stats.marker, Some(5));

    // No growth on the next cycle, nothing more fetched
    watcher.poll_once(&cancel).await.unwrap();
    assert_eq!(watcher.state().last_tree_size(), Some(5));
}

#[tokio::test]
async fn test_watcher_keeps_marker_when_fetch_fails() {
    let server = MockServer::start().await;
    mount_sth(&server, 4).await;
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-entries"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let (publisher, _receiver) = event_bus(16);
    let settings = WatcherSettings {
        start: StartPosition::BehindHead(2),
        ..WatcherSettings::default()
    };
    let mut watcher = PerLogWatcher::new(
        LogDescriptor::new(&server.uri(), "Failing log"),
        Arc::new(client()),
        settings,
        publisher,
        StatsTracker::new(),
    );

    let cancel = CancellationToken::new();
    let err = watcher.poll_once(&cancel).await.unwrap_err();
    assert!(matches!(err, CertstreamError::Http { status: 403, .. }));
    assert_eq!(watcher.state().last_tree_size(), Some(2));
}

#[tokio::test]
async fn test_watcher_skips_undecodable_entry_in_chunk() {
    let server = MockServer::start().await;
    mount_sth(&server, 13).await;

    let entry = |domain: &str| {
        let entry = x509_entry(&mint_certificate(domain, &[domain], false), &[]);
        json!({ "leaf_input": entry.leaf_input, "extra_data": entry.extra_data })
    };
    let garbage = x509_entry(b"definitely not DER", &[]);
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-entries"))
        .and(query_param("start", "10"))
        .and(query_param("end", "12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [
                entry("ten.example.com"),
                { "leaf_input": garbage.leaf_input, "extra_data": garbage.extra_data },
                entry("twelve.example.com"),
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (publisher, mut receiver) = event_bus(16);
    let stats = StatsTracker::new();
    let descriptor = LogDescriptor::new(&server.uri(), "Mock log");
    let settings = WatcherSettings {
        start: StartPosition::BehindHead(3),
        ..WatcherSettings::default()
    };
    let mut watcher = PerLogWatcher::new(
        descriptor.clone(),
        Arc::new(client()),
        settings,
        publisher,
        stats.clone(),
    );

    watcher.poll_once(&CancellationToken::new()).await.unwrap();
    assert_eq!(watcher.state().last_tree_size(), Some(13));

    let first = receiver.recv().await.unwrap();
    let second = receiver.recv().await.unwrap();
    assert_eq!(first.cert_index, 10);
    assert_eq!(first.all_domains()[0], "ten.example.com");
    assert_eq!(second.cert_index, 12);
    assert_eq!(second.all_domains()[0], "twelve.example.com");
    drop(watcher);
    assert!(receiver.recv().await.is_none());

    let snapshot = stats.get_snapshot();
    assert_eq!(snapshot.total_published, 2);
    assert_eq!(snapshot.total_decode_failures, 1);
    assert_eq!(snapshot.per_log[&descriptor.url].marker, Some(13));
}
