use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::EventStream;

/// An event kept by [`EventCollector`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CollectedEvent {
    pub tag: String,
    pub timestamp: DateTime<Utc>,
    /// The payload, embedded as JSON when it parses as JSON
    pub message: serde_json::Value,
}

/// Keeps the most recent events in memory, oldest dropped first.
#[derive(Debug)]
pub struct EventCollector {
    max_items: usize,
    items: Mutex<VecDeque<CollectedEvent>>,
}

impl EventCollector {
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items,
            items: Mutex::new(VecDeque::with_capacity(max_items)),
        }
    }

    /// Snapshot of the collected events, oldest first.
    pub fn items(&self) -> Vec<CollectedEvent> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.iter().cloned().collect()
    }

    /// The collected events as a JSON array.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.items())
    }
}

impl EventStream for EventCollector {
    fn publish(&self, tag: &str, payload: &[u8]) {
        if self.max_items == 0 {
            return;
        }

        let message = serde_json::from_slice(payload).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(payload).into_owned())
        });
        let event = CollectedEvent {
            tag: tag.to_string(),
            timestamp: Utc::now(),
            message,
        };

        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.push_back(event);
        while items.len() > self.max_items {
            items.pop_front();
        }
    }
}
