// Subscriber Registry
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Connected subscribers and their private outbound queues. Pushes never
// wait: a subscriber whose queue is full is evicted and its connection is
// closed, so one stalled client cannot hold up the others.

use super::message::{Channel, Frame, UpdateFrames};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default per-subscriber outbound queue length
pub const DEFAULT_QUEUE_CAPACITY: usize = 512;

/// Public metadata of one subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberInfo {
    pub id: Uuid,
    pub remote_address: String,
    pub connected_at: DateTime<Utc>,
    pub channel: Channel,
}

struct SubscriberHandle {
    info: SubscriberInfo,
    tx: mpsc::Sender<Frame>,
    token: CancellationToken,
}

/// What the connection's send loop owns
pub struct Subscription {
    pub id: Uuid,
    pub channel: Channel,
    /// Outbound frames, drained by the send loop only
    pub receiver: mpsc::Receiver<Frame>,
    /// Fires on eviction, removal or shutdown
    pub token: CancellationToken,
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub evicted: usize,
}

/// Registry of live subscribers; clones share state
#[derive(Clone)]
pub struct SubscriberRegistry {
    subscribers: Arc<RwLock<HashMap<Uuid, SubscriberHandle>>>,
    queue_capacity: usize,
    shutdown: CancellationToken,
}

impl SubscriberRegistry {
    /// Subscriber tokens are children of `shutdown`
    pub fn new(queue_capacity: usize, shutdown: CancellationToken) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            queue_capacity: queue_capacity.max(1),
            shutdown,
        }
    }

    /// Add a subscriber and hand back its queue
    pub async fn register(&self, remote_address: impl Into<String>, channel: Channel) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.queue_capacity);
        let token = self.shutdown.child_token();
        let info = SubscriberInfo {
            id: Uuid::new_v4(),
            remote_address: remote_address.into(),
            connected_at: Utc::now(),
            channel,
        };
        let id = info.id;

        info!(
            "Subscriber {} connected from {} on channel {}",
            id, info.remote_address, channel
        );

        self.subscribers.write().await.insert(
            id,
            SubscriberHandle {
                info,
                tx,
                token: token.clone(),
            },
        );

        Subscription {
            id,
            channel,
            receiver,
            token,
        }
    }

    /// Remove a subscriber; true if it was still registered
    pub async fn remove(&self, id: Uuid) -> bool {
        match self.subscribers.write().await.remove(&id) {
            Some(handle) => {
                handle.token.cancel();
                debug!("Subscriber {} removed", id);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Metadata for every live subscriber, oldest connection first
    pub async fn snapshot(&self) -> Vec<SubscriberInfo> {
        let mut infos: Vec<SubscriberInfo> = self
            .subscribers
            .read()
            .await
            .values()
            .map(|handle| handle.info.clone())
            .collect();
        infos.sort_by_key(|info| info.connected_at);
        infos
    }

    /// Push a certificate update, projected per subscriber channel
    pub async fn broadcast_update(&self, frames: &UpdateFrames) -> Delivery {
        self.deliver(|channel| frames.for_channel(channel)).await
    }

    /// Push the same frame to everyone
    pub async fn broadcast_frame(&self, frame: &Frame) -> Delivery {
        self.deliver(|_| Arc::clone(frame)).await
    }

    async fn deliver<F>(&self, frame_for: F) -> Delivery
    where
        F: Fn(Channel) -> Frame,
    {
        let mut delivery = Delivery::default();
        let mut dropped = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (id, handle) in subscribers.iter() {
                match handle.tx.try_send(frame_for(handle.info.channel)) {
                    Ok(()) => delivery.delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(
                            "Subscriber {} ({}) is not keeping up, disconnecting",
                            id, handle.info.remote_address
                        );
                        dropped.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("Subscriber {} queue closed", id);
                        dropped.push(*id);
                    }
                }
            }
        }

        if !dropped.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in dropped {
                if let Some(handle) = subscribers.remove(&id) {
                    handle.token.cancel();
                    delivery.evicted += 1;
                }
            }
        }

        delivery
    }

    /// Cancel and forget every subscriber
    pub async fn close_all(&self) {
        let mut subscribers = self.subscribers.write().await;
        for handle in subscribers.values() {
            handle.token.cancel();
        }
        let count = subscribers.len();
        subscribers.clear();
        if count > 0 {
            info!("Closed {} subscriber connections", count);
        }
    }
}
