// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded queue of events waiting for the front-end.

use std::collections::VecDeque;
use std::sync::Mutex;

use parley_core::ChatEvent;
use tracing::warn;

/// Default number of undrained events kept before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// FIFO of [`ChatEvent`]s. Pushing never blocks; a full queue drops its
/// oldest event.
#[derive(Debug)]
pub struct EventQueue {
    events: Mutex<VecDeque<ChatEvent>>,
    capacity: usize,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, event: ChatEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() == self.capacity {
            events.pop_front();
            warn!(capacity = self.capacity, "event queue full, dropped oldest event");
        }
        events.push_back(event);
    }

    /// Removes and returns everything queued, oldest first.
    pub fn drain(&self) -> Vec<ChatEvent> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
