//! Shared types for the dispatch pipeline.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A single inbound message from either feed.
///
/// Ids are numeric and monotonically increasing; arrival order is implied
/// by id order. Messages are read-only once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Platform-assigned message id.
    pub id: u64,
    /// Screen name of the sender, without the mention sigil.
    pub sender: String,
    /// Message body.
    pub text: String,
}

impl Message {
    pub fn new(id: u64, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: sender.into(),
            text: text.into(),
        }
    }
}

/// Intra-run dedup set.
///
/// Both feeds can deliver the same message; marking before any processing
/// guarantees at most one reply even under re-delivery. The set lives for
/// one run only and grows monotonically.
#[derive(Debug, Default)]
pub struct SeenSet {
    ids: HashSet<u64>,
    max_id: Option<u64>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an id as seen. Returns `false` if it was already marked.
    pub fn mark(&mut self, id: u64) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.max_id = Some(self.max_id.map_or(id, |m| m.max(id)));
        true
    }

    /// Highest id marked this run, used as the new last-message marker.
    pub fn max_id(&self) -> Option<u64> {
        self.max_id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
