// Event Bus
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Bounded queue between the watchers (many producers) and the fan-out task
// (single consumer). A full bus makes producers wait; nothing is dropped.

use crate::ct_logs::parser::CertificateEvent;
use crate::error::CertstreamError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default bus capacity
pub const DEFAULT_BUS_CAPACITY: usize = 5000;

/// Create a bus with the given capacity (at least 1)
pub fn event_bus(capacity: usize) -> (EventPublisher, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventPublisher { tx }, EventReceiver { rx })
}

/// Producer handle, one clone per watcher
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<CertificateEvent>,
}

impl EventPublisher {
    /// Enqueue an event, waiting for capacity.
    ///
    /// Returns `Cancelled` if the token fires while waiting and `BusClosed`
    /// once the consumer is gone.
    pub async fn publish(
        &self,
        event: CertificateEvent,
        cancel: &CancellationToken,
    ) -> Result<(), CertstreamError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CertstreamError::Cancelled),
            sent = self.tx.send(event) => sent.map_err(|_| CertstreamError::BusClosed),
        }
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer handle, owned by the fan-out task
pub struct EventReceiver {
    rx: mpsc::Receiver<CertificateEvent>,
}

impl EventReceiver {
    /// Next event, or `None` once every publisher is dropped
    pub async fn recv(&mut self) -> Option<CertificateEvent> {
        self.rx.recv().await
    }

    /// Stop accepting events; queued ones can still be drained
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ct_logs::certificate::{CertificateRecord, Subject};
    use crate::ct_logs::parser::{EntryType, EventSource, LeafCertificate};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn event(index: u64) -> CertificateEvent {
        CertificateEvent {
            entry_type: EntryType::X509,
            leaf_cert: LeafCertificate {
                record: CertificateRecord {
                    subject: Subject::default(),
                    extensions: BTreeMap::new(),
                    not_before: 0,
                    not_after: 0,
                    serial_number: "01".to_string(),
                    fingerprint: String::new(),
                    as_der: String::new(),
                },
                all_domains: vec![],
            },
            chain: vec![],
            cert_index: index,
            seen_at: 0.0,
            source: EventSource {
                url: "https://log.example".to_string(),
                description: "Example".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_publish_preserves_order() {
        let (publisher, mut receiver) = event_bus(8);
        let token = CancellationToken::new();

        for i in 0..5 {
            publisher.publish(event(i), &token).await.unwrap();
        }

        for i in 0..5 {
            assert_eq!(receiver.recv().await.unwrap().cert_index, i);
        }
    }

    #[tokio::test]
    async fn test_full_bus_blocks_until_cancelled() {
        let (publisher, _receiver) = event_bus(1);
        let token = CancellationToken::new();

        publisher.publish(event(0), &token).await.unwrap();
        assert_eq!(publisher.available(), 0);

        // Second publish must wait, not drop
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            publisher.publish(event(1), &token),
        )
        .await;
        assert!(blocked.is_err());

        token.cancel();
        assert!(matches!(
            publisher.publish(event(1), &token).await,
            Err(CertstreamError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_publish_after_consumer_dropped() {
        let (publisher, receiver) = event_bus(4);
        drop(receiver);

        assert!(matches!(
            publisher.publish(event(0), &CancellationToken::new()).await,
            Err(CertstreamError::BusClosed)
        ));
    }
}
