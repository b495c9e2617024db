//! Match-room registry with an activity-based garbage-collection sweep.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;

use super::protocol::RsvpCounts;

/// Rooms with no observed activity for this long are evicted.
const INACTIVE_AFTER_DAYS: i64 = 7;

/// Rooms older than this are evicted unconditionally, regardless of recent
/// activity. Backstop against rooms kept alive by spurious events.
const MASTER_KILL_DAYS: i64 = 10;

/// Maximum tracked rooms. 24 matches/week across two overlapping RSVP
/// cycles is 48; 50 gives a small buffer.
const MAX_ROOMS: usize = 50;

/// Per-room metadata tracked by the bridge.
#[derive(Debug, Clone, Serialize)]
pub struct RoomEntry {
    pub first_joined: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub rsvp_count: u64,
    pub websocket_events: u64,
    pub auto_joined: bool,
    pub rsvp_message_posted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_summary: Option<RsvpCounts>,
}

impl RoomEntry {
    fn new(now: DateTime<Utc>, auto_joined: bool, rsvp_message_posted: bool) -> Self {
        Self {
            first_joined: now,
            last_updated: now,
            rsvp_count: 0,
            websocket_events: 0,
            auto_joined,
            rsvp_message_posted,
            last_summary: None,
        }
    }
}

/// Registry of match rooms the bridge is subscribed to.
///
/// Owned exclusively by the bridge; external callers read snapshots via
/// accessor methods, never live references.
pub struct RoomRegistry {
    rooms: DashMap<i64, RoomEntry>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn contains(&self, match_id: i64) -> bool {
        self.rooms.contains_key(&match_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// All tracked match ids (for rejoin after reconnect).
    pub fn match_ids(&self) -> Vec<i64> {
        self.rooms.iter().map(|e| *e.key()).collect()
    }

    /// Copy of a room's metadata.
    pub fn get(&self, match_id: i64) -> Option<RoomEntry> {
        self.rooms.get(&match_id).map(|e| e.clone())
    }

    /// Track a room that was joined reactively after observing an event for
    /// an unknown match.
    pub fn insert_auto_joined(&self, match_id: i64, now: DateTime<Utc>) {
        self.rooms
            .entry(match_id)
            .or_insert_with(|| RoomEntry::new(now, true, false));
    }

    /// Track a room after an explicit join was acknowledged.
    pub fn insert_joined(&self, match_id: i64, now: DateTime<Utc>) {
        self.rooms
            .entry(match_id)
            .or_insert_with(|| RoomEntry::new(now, false, false));
    }

    /// Track a room joined right after an RSVP prompt was posted.
    pub fn insert_posted(&self, match_id: i64, now: DateTime<Utc>) {
        let mut entry = self
            .rooms
            .entry(match_id)
            .or_insert_with(|| RoomEntry::new(now, false, true));
        entry.rsvp_message_posted = true;
        entry.last_updated = now;
    }

    /// Record an observed RSVP event for a tracked room.
    pub fn record_event(&self, match_id: i64, now: DateTime<Utc>) {
        if let Some(mut entry) = self.rooms.get_mut(&match_id) {
            entry.last_updated = now;
            entry.rsvp_count += 1;
            entry.websocket_events += 1;
        }
    }

    /// Record a summary broadcast for a tracked room.
    pub fn record_summary(&self, match_id: i64, counts: RsvpCounts) {
        if let Some(mut entry) = self.rooms.get_mut(&match_id) {
            entry.last_summary = Some(counts);
        }
    }

    /// Drop all rooms (used on disconnect).
    pub fn clear(&self) {
        self.rooms.clear();
    }

    /// Garbage-collect old rooms. Returns the evicted match ids so the
    /// caller can emit best-effort leave requests for them.
    ///
    /// Eviction rules:
    /// 1. no activity for 7+ days (next RSVP cycle boundary);
    /// 2. master kill: first joined 10+ days ago, unconditionally;
    /// 3. over the 50-room cap: keep the most recently updated 50.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<i64> {
        let mut evicted: Vec<i64> = Vec::new();

        for entry in self.rooms.iter() {
            let idle = now - entry.last_updated >= Duration::days(INACTIVE_AFTER_DAYS);
            let master_kill = now - entry.first_joined >= Duration::days(MASTER_KILL_DAYS);
            if idle || master_kill {
                if master_kill {
                    tracing::info!(match_id = *entry.key(), "master kill: room past hard age limit");
                }
                evicted.push(*entry.key());
            }
        }

        // The cap applies to the rooms surviving the age rules above.
        let mut survivors: Vec<(i64, DateTime<Utc>)> = self
            .rooms
            .iter()
            .filter(|e| !evicted.contains(e.key()))
            .map(|e| (*e.key(), e.last_updated))
            .collect();
        if survivors.len() > MAX_ROOMS {
            survivors.sort_by(|a, b| b.1.cmp(&a.1));
            for (match_id, _) in survivors.into_iter().skip(MAX_ROOMS) {
                evicted.push(match_id);
            }
        }

        for match_id in &evicted {
            self.rooms.remove(match_id);
        }

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_join_is_idempotent() {
        let registry = RoomRegistry::new();
        let now = Utc::now();

        registry.insert_auto_joined(42, now);
        registry.record_event(42, now);
        registry.insert_auto_joined(42, now);
        registry.record_event(42, now);

        assert_eq!(registry.len(), 1);
        let entry = registry.get(42).unwrap();
        assert!(entry.auto_joined);
        assert_eq!(entry.rsvp_count, 2);
        assert_eq!(entry.websocket_events, 2);
    }

    #[test]
    fn posted_join_marks_flag_without_resetting_counts() {
        let registry = RoomRegistry::new();
        let now = Utc::now();

        registry.insert_auto_joined(7, now);
        registry.record_event(7, now);
        registry.insert_posted(7, now);

        let entry = registry.get(7).unwrap();
        assert!(entry.rsvp_message_posted);
        assert_eq!(entry.rsvp_count, 1);
    }

    #[test]
    fn sweep_evicts_inactive_rooms() {
        let registry = RoomRegistry::new();
        let now = Utc::now();

        registry.insert_auto_joined(1, now - Duration::days(8));
        registry.insert_auto_joined(2, now);
        registry.record_event(2, now);

        let evicted = registry.sweep(now);
        assert_eq!(evicted, vec![1]);
        assert!(!registry.contains(1));
        assert!(registry.contains(2));
    }

    #[test]
    fn sweep_master_kill_ignores_recent_activity() {
        let registry = RoomRegistry::new();
        let now = Utc::now();

        registry.insert_auto_joined(5, now - Duration::days(11));
        // Keep the room "active" — master kill must still remove it.
        registry.record_event(5, now);

        let evicted = registry.sweep(now);
        assert_eq!(evicted, vec![5]);
        assert!(!registry.contains(5));
    }

    #[test]
    fn sweep_enforces_room_cap_keeping_most_recent() {
        let registry = RoomRegistry::new();
        let now = Utc::now();

        for i in 0..60 {
            registry.insert_auto_joined(i, now);
            // Stagger last_updated so recency ordering is deterministic.
            registry.record_event(i, now - Duration::minutes(60 - i));
        }

        let evicted = registry.sweep(now);
        assert_eq!(evicted.len(), 10);
        assert_eq!(registry.len(), 50);
        // The ten least recently updated rooms (ids 0..10) are gone.
        for i in 0..10 {
            assert!(!registry.contains(i), "room {i} should be evicted");
        }
        for i in 10..60 {
            assert!(registry.contains(i), "room {i} should survive");
        }
    }

    #[test]
    fn room_cap_counts_only_rooms_surviving_the_age_rules() {
        let registry = RoomRegistry::new();
        let now = Utc::now();

        // Ten rooms past the master-kill age, but with very recent activity
        // so they sort ahead of everything else by recency.
        for i in 0..10 {
            registry.insert_auto_joined(1000 + i, now - Duration::days(11));
            registry.record_event(1000 + i, now);
        }
        // Forty-five live rooms, all under the cap once the old ones go.
        for i in 0..45 {
            registry.insert_auto_joined(i, now - Duration::hours(i));
        }

        let evicted = registry.sweep(now);
        assert_eq!(evicted.len(), 10);
        assert!(evicted.iter().all(|id| *id >= 1000));
        assert_eq!(registry.len(), 45);
        for i in 0..45 {
            assert!(registry.contains(i), "live room {i} should survive");
        }
    }

    #[test]
    fn clear_empties_registry() {
        let registry = RoomRegistry::new();
        registry.insert_auto_joined(1, Utc::now());
        registry.clear();
        assert!(registry.is_empty());
    }
}
