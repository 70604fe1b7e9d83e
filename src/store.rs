//! Live rooms and their timers.
//!
//! Each room sits behind its own mutex so handlers for different rooms never
//! contend. Timers are plain tokio tasks; the store keeps their abort handles
//! so they can be cancelled the moment their condition is met some other way.
//! Every timer carries an id, and a firing timer must claim its registry entry
//! (`take_*`) before acting: a missing or replaced entry means it is stale.

use crate::types::*;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

pub type SharedRoom = Arc<Mutex<Room>>;

/// Room codes are base-36, uppercase
const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 6;

/// Generate a random room code (6 characters)
pub fn generate_room_code() -> RoomCode {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

struct TimerEntry {
    id: String,
    handle: AbortHandle,
}

impl TimerEntry {
    fn cancel(self) {
        self.handle.abort();
    }
}

#[derive(Default)]
pub struct RoomStore {
    rooms: DashMap<RoomCode, SharedRoom>,
    round_timers: DashMap<RoomCode, TimerEntry>,
    grace_timers: DashMap<(RoomCode, PlayerId), TimerEntry>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room under a fresh unique code, built by `build`
    pub fn create_room(&self, build: impl FnOnce(RoomCode) -> Room) -> (RoomCode, SharedRoom) {
        loop {
            let code = generate_room_code();
            // Collision - try again (2 billion codes, extremely rare)
            if let Entry::Vacant(entry) = self.rooms.entry(code.clone()) {
                let room = Arc::new(Mutex::new(build(code.clone())));
                entry.insert(room.clone());
                return (code, room);
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<SharedRoom> {
        self.rooms.get(code).map(|room| room.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Delete a room and cancel every timer that belongs to it
    pub fn remove(&self, code: &str) -> Option<SharedRoom> {
        self.cancel_round_timer(code);
        let stale: Vec<_> = self
            .grace_timers
            .iter()
            .filter(|entry| entry.key().0 == code)
            .map(|entry| entry.key().clone())
            .collect();
        for key in stale {
            if let Some((_, timer)) = self.grace_timers.remove(&key) {
                timer.cancel();
            }
        }
        self.rooms.remove(code).map(|(_, room)| room)
    }

    /// Register the room's round timer, cancelling the previous one first
    pub fn set_round_timer(&self, code: &str, timer_id: String, handle: AbortHandle) {
        let previous = self.round_timers.insert(
            code.to_string(),
            TimerEntry {
                id: timer_id,
                handle,
            },
        );
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    pub fn cancel_round_timer(&self, code: &str) -> bool {
        match self.round_timers.remove(code) {
            Some((_, timer)) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Claim the round timer slot for a firing timer.
    /// False if it was cancelled or superseded.
    pub fn take_round_timer(&self, code: &str, timer_id: &str) -> bool {
        self.round_timers
            .remove_if(code, |_, timer| timer.id == timer_id)
            .is_some()
    }

    pub fn has_round_timer(&self, code: &str) -> bool {
        self.round_timers.contains_key(code)
    }

    pub fn set_grace_timer(
        &self,
        code: &str,
        player_id: &str,
        timer_id: String,
        handle: AbortHandle,
    ) {
        let previous = self.grace_timers.insert(
            (code.to_string(), player_id.to_string()),
            TimerEntry {
                id: timer_id,
                handle,
            },
        );
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    pub fn cancel_grace_timer(&self, code: &str, player_id: &str) -> bool {
        match self
            .grace_timers
            .remove(&(code.to_string(), player_id.to_string()))
        {
            Some((_, timer)) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    pub fn take_grace_timer(&self, code: &str, player_id: &str, timer_id: &str) -> bool {
        self.grace_timers
            .remove_if(&(code.to_string(), player_id.to_string()), |_, timer| {
                timer.id == timer_id
            })
            .is_some()
    }

    pub fn has_grace_timer(&self, code: &str, player_id: &str) -> bool {
        self.grace_timers
            .contains_key(&(code.to_string(), player_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::test_helpers::*;
    use std::future::pending;

    fn idle_task() -> tokio::task::JoinHandle<()> {
        tokio::spawn(pending::<()>())
    }

    #[test]
    fn test_room_code_format() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.len(), 6);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let store = RoomStore::new();
        let (code, _) = store.create_room(|code| {
            let mut room = room_with(&["h"]);
            room.code = code;
            room
        });

        let room = store.get(&code).unwrap();
        assert_eq!(room.lock().await.code, code);
        assert_eq!(store.room_count(), 1);

        assert!(store.remove(&code).is_some());
        assert!(store.get(&code).is_none());
    }

    #[tokio::test]
    async fn test_arming_round_timer_cancels_previous() {
        let store = RoomStore::new();
        let first = idle_task();
        let second = idle_task();

        store.set_round_timer("R", "t1".to_string(), first.abort_handle());
        store.set_round_timer("R", "t2".to_string(), second.abort_handle());

        assert!(first.await.unwrap_err().is_cancelled());
        assert!(!store.take_round_timer("R", "t1"));
        assert!(store.take_round_timer("R", "t2"));
        assert!(!store.has_round_timer("R"));
        second.abort();
    }

    #[tokio::test]
    async fn test_cancel_round_timer() {
        let store = RoomStore::new();
        let task = idle_task();
        store.set_round_timer("R", "t1".to_string(), task.abort_handle());

        assert!(store.cancel_round_timer("R"));
        assert!(!store.cancel_round_timer("R"));
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_grace_timers_are_keyed_by_room_and_player() {
        let store = RoomStore::new();
        let a = idle_task();
        let b = idle_task();
        store.set_grace_timer("R", "p1", "g1".to_string(), a.abort_handle());
        store.set_grace_timer("R", "p2", "g2".to_string(), b.abort_handle());

        assert!(store.cancel_grace_timer("R", "p1"));
        assert!(a.await.unwrap_err().is_cancelled());
        assert!(store.has_grace_timer("R", "p2"));
        assert!(!store.take_grace_timer("R", "p2", "other"));
        assert!(store.take_grace_timer("R", "p2", "g2"));
        b.abort();
    }

    #[tokio::test]
    async fn test_remove_room_cancels_its_timers() {
        let store = RoomStore::new();
        let (code, _) = store.create_room(|code| {
            let mut room = room_with(&["h"]);
            room.code = code;
            room
        });
        let round = idle_task();
        let grace = idle_task();
        let other = idle_task();
        store.set_round_timer(&code, "t".to_string(), round.abort_handle());
        store.set_grace_timer(&code, "p1", "g".to_string(), grace.abort_handle());
        store.set_grace_timer("OTHER1", "p1", "g".to_string(), other.abort_handle());

        store.remove(&code);

        assert!(round.await.unwrap_err().is_cancelled());
        assert!(grace.await.unwrap_err().is_cancelled());
        assert!(store.has_grace_timer("OTHER1", "p1"));
        other.abort();
    }
}
