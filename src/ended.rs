//! Bounded memory of ended session ids
//!
//! Oldest ids are forgotten first once `capacity` is reached; a forgotten
//! id reads as never ended.

use std::collections::{HashSet, VecDeque};

/// Ended ids kept by the registry and the broker
pub const ENDED_SESSION_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct EndedIds {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl EndedIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    /// Remember `session_id`, forgetting the oldest id when full. Returns
    /// the forgotten id, if any.
    pub fn insert(&mut self, session_id: &str) -> Option<String> {
        if !self.ids.insert(session_id.to_string()) {
            return None;
        }
        self.order.push_back(session_id.to_string());

        if self.order.len() <= self.capacity {
            return None;
        }
        let evicted = self.order.pop_front()?;
        self.ids.remove(&evicted);
        Some(evicted)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.ids.contains(session_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for EndedIds {
    fn default() -> Self {
        Self::new(ENDED_SESSION_CAPACITY)
    }
}
