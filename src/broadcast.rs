//! Pub/sub between sockets and room channels.
//!
//! Every socket owns an unbounded outbound queue. A socket is subscribed to at
//! most one channel (named by room code) at a time. Messages sent from one
//! task are queued in call order, so a receiver always sees a room's
//! broadcasts in the order they were emitted.

use crate::protocol::ServerMessage;
use crate::types::{RoomCode, TransportId};
use dashmap::DashMap;
use std::collections::HashSet;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct Hub {
    connections: DashMap<TransportId, mpsc::UnboundedSender<ServerMessage>>,
    channels: DashMap<RoomCode, HashSet<TransportId>>,
    memberships: DashMap<TransportId, RoomCode>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket and hand back its outbound queue
    pub fn register(&self, transport_id: &str) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(transport_id.to_string(), tx);
        rx
    }

    /// Drop a socket, returning the channel it was subscribed to
    pub fn unregister(&self, transport_id: &str) -> Option<RoomCode> {
        self.connections.remove(transport_id);
        self.leave(transport_id)
    }

    /// Subscribe a socket to a room channel, leaving any previous one
    pub fn join(&self, transport_id: &str, room_code: &str) {
        self.leave(transport_id);
        self.channels
            .entry(room_code.to_string())
            .or_default()
            .insert(transport_id.to_string());
        self.memberships
            .insert(transport_id.to_string(), room_code.to_string());
    }

    pub fn leave(&self, transport_id: &str) -> Option<RoomCode> {
        let (_, room_code) = self.memberships.remove(transport_id)?;
        let now_empty = match self.channels.get_mut(&room_code) {
            Some(mut members) => {
                members.remove(transport_id);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.channels.remove_if(&room_code, |_, members| members.is_empty());
        }
        Some(room_code)
    }

    /// Unsubscribe everyone from a channel (room deleted)
    pub fn close_channel(&self, room_code: &str) {
        if let Some((_, members)) = self.channels.remove(room_code) {
            for transport_id in members {
                self.memberships
                    .remove_if(&transport_id, |_, code| code == room_code);
            }
        }
    }

    pub fn channel_of(&self, transport_id: &str) -> Option<RoomCode> {
        self.memberships.get(transport_id).map(|code| code.clone())
    }

    /// Send to a single socket. Closed sockets are ignored.
    pub fn send_to(&self, transport_id: &str, msg: ServerMessage) {
        if let Some(tx) = self.connections.get(transport_id) {
            let _ = tx.send(msg);
        }
    }

    /// Send to every socket subscribed to the room channel
    pub fn broadcast(&self, room_code: &str, msg: ServerMessage) {
        let Some(members) = self.channels.get(room_code) else {
            return;
        };
        for transport_id in members.iter() {
            if let Some(tx) = self.connections.get(transport_id) {
                // Ignore send errors (socket already closing is fine)
                let _ = tx.send(msg.clone());
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(code: &str) -> ServerMessage {
        ServerMessage::Error {
            code: code.to_string(),
            message: String::new(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_channel_members_only() {
        let hub = Hub::new();
        let mut a = hub.register("a");
        let mut b = hub.register("b");
        let mut c = hub.register("c");
        hub.join("a", "ROOM1");
        hub.join("b", "ROOM1");
        hub.join("c", "ROOM2");

        hub.broadcast("ROOM1", error("X"));

        assert_eq!(a.try_recv().unwrap(), error("X"));
        assert_eq!(b.try_recv().unwrap(), error("X"));
        assert!(c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_preserves_order() {
        let hub = Hub::new();
        let mut a = hub.register("a");
        hub.join("a", "ROOM1");

        hub.broadcast("ROOM1", error("FIRST"));
        hub.send_to("a", error("SECOND"));
        hub.broadcast("ROOM1", error("THIRD"));

        assert_eq!(a.try_recv().unwrap(), error("FIRST"));
        assert_eq!(a.try_recv().unwrap(), error("SECOND"));
        assert_eq!(a.try_recv().unwrap(), error("THIRD"));
    }

    #[tokio::test]
    async fn test_join_moves_between_channels() {
        let hub = Hub::new();
        let mut a = hub.register("a");
        hub.join("a", "ROOM1");
        hub.join("a", "ROOM2");
        assert_eq!(hub.channel_of("a").as_deref(), Some("ROOM2"));

        hub.broadcast("ROOM1", error("X"));
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_and_close_channel() {
        let hub = Hub::new();
        let _a = hub.register("a");
        let _b = hub.register("b");
        hub.join("a", "ROOM1");
        hub.join("b", "ROOM1");

        assert_eq!(hub.unregister("a").as_deref(), Some("ROOM1"));
        assert_eq!(hub.connection_count(), 1);

        hub.close_channel("ROOM1");
        assert!(hub.channel_of("b").is_none());
    }
}
