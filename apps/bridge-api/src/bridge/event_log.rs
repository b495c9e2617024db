//! Bounded, append-only log of observed RSVP events.
//!
//! Kept for debugging and for the REST-vs-WebSocket validation endpoint.
//! Entries are immutable once appended; the oldest are evicted FIFO.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::protocol::{Availability, EventSource};

/// Default maximum number of retained events.
pub const DEFAULT_CAPACITY: usize = 1000;

/// A single observed RSVP change.
#[derive(Debug, Clone, Serialize)]
pub struct RsvpEvent {
    pub match_id: i64,
    pub player_id: Option<i64>,
    pub player_name: String,
    pub availability: Availability,
    pub source: EventSource,
    pub team_id: Option<i64>,
    /// Event time as stamped by the backend.
    pub timestamp: Option<DateTime<Utc>>,
    /// When this bridge observed the event.
    pub received_at: DateTime<Utc>,
}

pub struct EventLog {
    entries: Mutex<VecDeque<RsvpEvent>>,
    capacity: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
        }
    }

    /// Append an event, evicting the oldest entry if at capacity.
    pub fn append(&self, event: RsvpEvent) {
        let mut entries = self.entries.lock();
        entries.push_back(event);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// The newest `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<RsvpEvent> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Events for one match among the newest `scan` entries, oldest first.
    pub fn for_match(&self, match_id: i64, scan: usize) -> Vec<RsvpEvent> {
        self.recent(scan)
            .into_iter()
            .filter(|e| e.match_id == match_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(match_id: i64, player_id: i64) -> RsvpEvent {
        RsvpEvent {
            match_id,
            player_id: Some(player_id),
            player_name: format!("player-{player_id}"),
            availability: Availability::Yes,
            source: EventSource::Web,
            team_id: None,
            timestamp: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn log_is_bounded_and_evicts_fifo() {
        let log = EventLog::with_capacity(100);
        for i in 0..150 {
            log.append(event(1, i));
        }

        assert_eq!(log.len(), 100);
        let all = log.recent(100);
        // The first 50 entries were evicted.
        assert_eq!(all.first().unwrap().player_id, Some(50));
        assert_eq!(all.last().unwrap().player_id, Some(149));
    }

    #[test]
    fn recent_returns_newest_in_order() {
        let log = EventLog::new();
        for i in 0..10 {
            log.append(event(1, i));
        }

        let last_three = log.recent(3);
        let ids: Vec<_> = last_three.iter().map(|e| e.player_id.unwrap()).collect();
        assert_eq!(ids, vec![7, 8, 9]);
    }

    #[test]
    fn for_match_filters_by_match_id() {
        let log = EventLog::new();
        log.append(event(1, 10));
        log.append(event(2, 11));
        log.append(event(1, 12));

        let match_one = log.for_match(1, 100);
        assert_eq!(match_one.len(), 2);
        assert!(match_one.iter().all(|e| e.match_id == 1));
    }
}
