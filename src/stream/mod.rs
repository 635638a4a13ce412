// Event Streaming Module
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Distribution side of the pipeline: the event bus, subscriber registry,
// recent history and the fan-out/heartbeat tasks.

pub mod bus;
pub mod fanout;
pub mod history;
pub mod message;
pub mod registry;

pub use bus::{event_bus, EventPublisher, EventReceiver};
pub use fanout::{run_fanout, run_heartbeats};
pub use history::RecentHistory;
pub use message::{Channel, Frame, InvalidChannel, StreamMessage, UpdateFrames};
pub use registry::{Delivery, SubscriberInfo, SubscriberRegistry, Subscription};
