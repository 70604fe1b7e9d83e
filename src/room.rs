//! Room aggregate: player bookkeeping and the host invariant.
//!
//! Whenever `players` is non-empty exactly one of them has `is_host` set and
//! `host_player_id` names that player.

use crate::types::*;
use std::collections::BTreeSet;

impl Room {
    /// Create a room with `host` as its only player
    pub fn new(
        code: RoomCode,
        mut host: Player,
        categories: Vec<String>,
        default_time_limit_seconds: u32,
    ) -> Self {
        let now = now_ms();
        host.is_host = true;
        Self {
            code,
            host_player_id: host.id.clone(),
            players: vec![host],
            categories,
            questions: Vec::new(),
            current_question_index: 0,
            phase: RoomPhase::Waiting,
            default_time_limit_seconds,
            game: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn player_by_transport(&self, transport_id: &str) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.transport_id.as_deref() == Some(transport_id))
    }

    pub fn player_by_transport_mut(&mut self, transport_id: &str) -> Option<&mut Player> {
        self.players
            .iter_mut()
            .find(|p| p.transport_id.as_deref() == Some(transport_id))
    }

    /// Whether the socket belongs to the current host
    pub fn is_host_transport(&self, transport_id: &str) -> bool {
        self.player_by_transport(transport_id)
            .map(|p| p.is_host)
            .unwrap_or(false)
    }

    pub fn connected_player_ids(&self) -> BTreeSet<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.connected)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Append a new player in join order. Never makes them host.
    pub fn add_player(&mut self, mut player: Player) {
        player.is_host = false;
        self.players.push(player);
        self.touch();
    }

    /// Rebind an existing seat to a new socket
    pub fn reconnect_player(&mut self, player_id: &str, transport_id: TransportId) -> bool {
        let Some(player) = self.player_mut(player_id) else {
            return false;
        };
        player.transport_id = Some(transport_id);
        player.connected = true;
        player.disconnected_at = None;
        self.touch();
        true
    }

    /// Mark the seat bound to `transport_id` as disconnected.
    /// Returns the player id and the disconnect timestamp.
    pub fn disconnect_transport(&mut self, transport_id: &str) -> Option<(PlayerId, Millis)> {
        let now = now_ms();
        let player = self.player_by_transport_mut(transport_id)?;
        player.connected = false;
        player.transport_id = None;
        player.disconnected_at = Some(now);
        let player_id = player.id.clone();

        // Readiness only counts for connected players
        if let Some(round) = self.game.as_mut() {
            round.ready_player_ids.remove(&player_id);
        }
        self.touch();
        Some((player_id, now))
    }

    /// Remove a player permanently, transferring host if they held it
    pub fn remove_player(&mut self, player_id: &str) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == player_id)?;
        let removed = self.players.remove(index);

        if let Some(round) = self.game.as_mut() {
            round.ready_player_ids.remove(player_id);
            round.skip_voter_ids.remove(player_id);
        }

        if removed.is_host {
            self.transfer_host();
        }
        self.touch();
        Some(removed)
    }

    /// Hand the host role to the first connected player, falling back to the
    /// first player in join order. No-op on an empty room.
    pub fn transfer_host(&mut self) -> Option<PlayerId> {
        for player in self.players.iter_mut() {
            player.is_host = false;
        }

        let index = self
            .players
            .iter()
            .position(|p| p.connected)
            .or_else(|| (!self.players.is_empty()).then_some(0))?;

        let new_host = &mut self.players[index];
        new_host.is_host = true;
        self.host_player_id = new_host.id.clone();
        tracing::info!(
            "Room {}: host transferred to {}",
            self.code,
            self.host_player_id
        );
        Some(self.host_player_id.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;

    pub fn player(id: &str) -> Player {
        Player::new(id.to_string(), format!("conn-{}", id), id.to_uppercase(), None)
    }

    /// Room "ABC123" hosted by the first id, the rest joined in order
    pub fn room_with(ids: &[&str]) -> Room {
        let mut room = Room::new("ABC123".to_string(), player(ids[0]), Vec::new(), 30);
        for id in &ids[1..] {
            room.add_player(player(id));
        }
        room
    }

    pub fn question(answer: &str, time_limit: Option<u32>) -> Question {
        Question {
            id: None,
            answer: answer.to_string(),
            time_limit,
            media_url: None,
            category: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn host_count(room: &Room) -> usize {
        room.players.iter().filter(|p| p.is_host).count()
    }
}
