//! Message history tracking for debugging and diagnostics.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::Command;

/// Direction of a message in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Enqueued for the dispatcher.
    Send,
    /// Routed to the device worker by the listener.
    Receive,
}

/// A recorded message in the history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub msg_type: MessageType,
    pub cmd: String,
    pub message: Value,
    /// Seconds since history creation
    pub timestamp: f64,
}

/// Tracks the most recent messages exchanged with one device.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    counts: HashMap<MessageType, usize>,
    last_error: Option<String>,
    start_time: Instant,
    entries: VecDeque<HistoryEntry>,
    max_entries: usize,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHistory {
    pub const DEFAULT_MAX_ENTRIES: usize = 100;

    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            last_error: None,
            start_time: Instant::now(),
            entries: VecDeque::new(),
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::new()
        }
    }

    pub fn record(&mut self, msg_type: MessageType, cmd: Command, message: Value) {
        *self.counts.entry(msg_type).or_default() += 1;

        self.entries.push_back(HistoryEntry {
            msg_type,
            cmd: cmd.to_string(),
            message,
            timestamp: self.start_time.elapsed().as_secs_f64(),
        });

        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn record_error(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
        self.entries.clear();
        self.last_error = None;
    }

    pub fn summary(&self) -> HistorySummary {
        let count = |t: MessageType| self.counts.get(&t).copied().unwrap_or(0);
        HistorySummary {
            send_count: count(MessageType::Send),
            receive_count: count(MessageType::Receive),
            total_entries: self.entries.len(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Summary of message history for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub send_count: usize,
    pub receive_count: usize,
    pub total_entries: usize,
    pub last_error: Option<String>,
}
