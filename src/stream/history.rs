// Recent History
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Fixed-capacity ring of the most recent certificate updates, written by the
// fan-out task and read by the snapshot endpoints.

use super::message::StreamMessage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Default number of retained updates
pub const DEFAULT_HISTORY_CAPACITY: usize = 25;

/// Shared ring buffer; clones share storage
#[derive(Clone)]
pub struct RecentHistory {
    inner: Arc<Mutex<VecDeque<StreamMessage>>>,
    capacity: usize,
}

impl RecentHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append, evicting the oldest entry when full
    pub fn push(&self, message: StreamMessage) {
        if let Ok(mut ring) = self.inner.lock() {
            while ring.len() >= self.capacity {
                ring.pop_front();
            }
            ring.push_back(message);
        }
    }

    /// Retained messages, oldest first
    pub fn snapshot(&self) -> Vec<StreamMessage> {
        self.inner
            .lock()
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Oldest retained message
    pub fn oldest(&self) -> Option<StreamMessage> {
        self.inner.lock().ok().and_then(|ring| ring.front().cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|ring| ring.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecentHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
