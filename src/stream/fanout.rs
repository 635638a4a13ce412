// Fan-out and Heartbeats
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// The single consumer of the event bus, plus the periodic heartbeat task.

use super::bus::EventReceiver;
use super::history::RecentHistory;
use super::message::{StreamMessage, UpdateFrames};
use super::registry::SubscriberRegistry;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default heartbeat period
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Drain the bus: record each update in history, then push it to every
/// subscriber. Returns the number of events forwarded.
pub async fn run_fanout(
    mut events: EventReceiver,
    registry: SubscriberRegistry,
    history: RecentHistory,
    cancel: CancellationToken,
) -> u64 {
    info!("Fan-out started");
    let mut forwarded = 0u64;

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = events.recv() => match next {
                Some(event) => event,
                None => {
                    debug!("All publishers gone");
                    break;
                }
            },
        };

        let frames = match UpdateFrames::render(&event) {
            Ok(frames) => frames,
            Err(e) => {
                error!(
                    "Failed to serialize entry {} from {}: {}",
                    event.cert_index, event.source.url, e
                );
                continue;
            }
        };

        history.push(StreamMessage::update(event));
        let delivery = registry.broadcast_update(&frames).await;
        if delivery.evicted > 0 {
            debug!("{} subscribers evicted during fan-out", delivery.evicted);
        }
        forwarded += 1;
    }

    events.close();
    info!("Fan-out stopped after {} events", forwarded);
    forwarded
}

/// Push a heartbeat to every subscriber each `period`, first one after one
/// full period. Returns the number of heartbeats sent.
pub async fn run_heartbeats(
    registry: SubscriberRegistry,
    period: Duration,
    cancel: CancellationToken,
) -> u64 {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match StreamMessage::heartbeat().to_frame() {
            Ok(frame) => {
                let delivery = registry.broadcast_frame(&frame).await;
                debug!("Heartbeat sent to {} subscribers", delivery.delivered);
                sent += 1;
            }
            Err(e) => error!("Failed to serialize heartbeat: {}", e),
        }
    }

    debug!("Heartbeat task stopped");
    sent
}
