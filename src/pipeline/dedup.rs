//! Event de-duplication cache.
//!
//! Remembers recently handled event ids so platform redeliveries (Socket Mode
//! retries, duplicate webhooks) produce at most one reply. Bounded two ways:
//! ids expire after `ttl`, and once `capacity` is reached the oldest id is
//! evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::DedupConfig;

struct DedupState {
    seen: HashMap<String, Instant>,
    /// Insertion order, oldest first. Holds exactly the keys of `seen`.
    order: VecDeque<(String, Instant)>,
}

/// Bounded, time-windowed set of seen event ids.
pub struct DedupCache {
    capacity: usize,
    ttl: Duration,
    state: Mutex<DedupState>,
}

impl DedupCache {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            ttl: config.ttl,
            state: Mutex::new(DedupState {
                seen: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Record `event_id`. Returns `true` the first time an id is seen within
    /// the window, `false` for a duplicate.
    ///
    /// Check and insert happen under one lock.
    pub fn check_and_insert(&self, event_id: &str) -> bool {
        self.check_and_insert_at(event_id, Instant::now())
    }

    pub(crate) fn check_and_insert_at(&self, event_id: &str, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        // Drop expired ids from the front.
        while let Some((_, at)) = state.order.front() {
            if now.saturating_duration_since(*at) < self.ttl {
                break;
            }
            if let Some((id, _)) = state.order.pop_front() {
                state.seen.remove(&id);
            }
        }

        if state.seen.contains_key(event_id) {
            debug!(event_id = %event_id, "Duplicate event id");
            return false;
        }

        while state.order.len() >= self.capacity {
            if let Some((id, _)) = state.order.pop_front() {
                state.seen.remove(&id);
            }
        }

        state.seen.insert(event_id.to_string(), now);
        state.order.push_back((event_id.to_string(), now));
        true
    }

    /// Number of ids currently remembered (including not-yet-pruned expired ones).
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
