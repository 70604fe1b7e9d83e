//! WebSocket message dispatch
//!
//! Maps each inbound event onto the lifecycle or round handler. Handlers
//! reply to the sending socket through the return value; anything addressed
//! to the room goes through the hub.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

use super::{room, round};

/// Handle a client message and return an optional reply for the sender
pub async fn handle_message(
    msg: ClientMessage,
    transport_id: &str,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        // Lifecycle
        ClientMessage::RoomCreate {
            player_id,
            player_name,
            avatar,
            categories,
            default_time_limit,
        } => {
            room::handle_create(
                state,
                transport_id,
                player_id,
                player_name,
                avatar,
                categories,
                default_time_limit,
            )
            .await
        }

        ClientMessage::RoomJoin {
            room_code,
            player_id,
            player_name,
            avatar,
        } => {
            room::handle_join(state, transport_id, &room_code, player_id, player_name, avatar)
                .await
        }

        ClientMessage::RoomRejoin {
            room_code,
            player_id,
        } => room::handle_rejoin(state, transport_id, &room_code, player_id).await,

        ClientMessage::RoomLeave { room_code } => {
            room::handle_leave(state, transport_id, &room_code).await
        }

        ClientMessage::UpdatePlayerName {
            room_code,
            player_name,
        } => room::handle_update_player_name(state, transport_id, &room_code, player_name).await,

        // Host-only commands (authorization checked under the room lock)
        ClientMessage::GameStart {
            room_code,
            questions,
            default_time_limit,
        } => {
            round::handle_start_game(state, transport_id, &room_code, questions, default_time_limit)
                .await
        }

        ClientMessage::GameRestart { room_code } => {
            round::handle_restart_game(state, transport_id, &room_code).await
        }

        ClientMessage::GameRestartWithCategories {
            room_code,
            questions,
            categories,
            default_time_limit,
        } => {
            round::handle_restart_with_categories(
                state,
                transport_id,
                &room_code,
                questions,
                categories,
                default_time_limit,
            )
            .await
        }

        ClientMessage::GameNext { room_code } => {
            round::handle_next(state, transport_id, &room_code).await
        }

        // Player round events
        ClientMessage::GameReady { room_code } => {
            round::handle_ready(state, transport_id, &room_code).await
        }

        ClientMessage::GameAnswer { room_code, answer } => {
            round::handle_answer(state, transport_id, &room_code, answer).await
        }

        ClientMessage::GameSkipVote { room_code } => {
            round::handle_skip_vote(state, transport_id, &room_code).await
        }

        ClientMessage::GameGetState { room_code } => {
            round::handle_get_state(state, transport_id, &room_code).await
        }
    }
}

/// Socket went away
pub async fn handle_disconnect(transport_id: &str, state: &Arc<AppState>) {
    room::handle_disconnect(state, transport_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::test_helpers::question;
    use crate::types::RoomCode;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn error_code(msg: &Option<ServerMessage>) -> Option<&str> {
        match msg {
            Some(ServerMessage::Error { code, .. }) => Some(code.as_str()),
            _ => None,
        }
    }

    async fn create(state: &Arc<AppState>, transport_id: &str, player_id: &str) -> RoomCode {
        let reply = handle_message(
            ClientMessage::RoomCreate {
                player_id: player_id.to_string(),
                player_name: player_id.to_string(),
                avatar: None,
                categories: vec![],
                default_time_limit: None,
            },
            transport_id,
            state,
        )
        .await;
        match reply {
            Some(ServerMessage::RoomCreated { room_code, .. }) => room_code,
            other => panic!("expected room:created, got {:?}", other),
        }
    }

    async fn join(state: &Arc<AppState>, transport_id: &str, code: &str, player_id: &str) {
        let reply = handle_message(
            ClientMessage::RoomJoin {
                room_code: code.to_string(),
                player_id: player_id.to_string(),
                player_name: player_id.to_string(),
                avatar: None,
            },
            transport_id,
            state,
        )
        .await;
        assert!(reply.is_none(), "unexpected reply {:?}", reply);
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        let state = Arc::new(AppState::new());
        let _rx = state.hub.register("t1");
        let reply = handle_message(
            ClientMessage::RoomJoin {
                room_code: "ZZZZZZ".to_string(),
                player_id: "p1".to_string(),
                player_name: String::new(),
                avatar: None,
            },
            "t1",
            &state,
        )
        .await;
        assert_eq!(error_code(&reply), Some("ROOM_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_non_host_cannot_start() {
        let state = Arc::new(AppState::new());
        let _h = state.hub.register("th");
        let _p = state.hub.register("tp");
        let code = create(&state, "th", "host").await;
        join(&state, "tp", &code, "p1").await;

        let reply = handle_message(
            ClientMessage::GameStart {
                room_code: code.clone(),
                questions: vec![question("Queen", None)],
                default_time_limit: None,
            },
            "tp",
            &state,
        )
        .await;
        assert_eq!(error_code(&reply), Some("UNAUTHORIZED"));

        let room = state.store.get(&code).unwrap();
        assert_eq!(room.lock().await.phase, crate::types::RoomPhase::Waiting);
    }

    #[tokio::test]
    async fn test_start_without_questions() {
        let state = Arc::new(AppState::new());
        let _h = state.hub.register("th");
        let code = create(&state, "th", "host").await;

        let reply = handle_message(
            ClientMessage::GameStart {
                room_code: code,
                questions: vec![],
                default_time_limit: None,
            },
            "th",
            &state,
        )
        .await;
        assert_eq!(error_code(&reply), Some("NO_QUESTIONS"));
    }

    #[tokio::test]
    async fn test_join_broadcasts_roster() {
        let state = Arc::new(AppState::new());
        let mut host_rx = state.hub.register("th");
        let mut p_rx = state.hub.register("tp");
        let code = create(&state, "th", "host").await;
        join(&state, "tp", &code, "p1").await;

        let to_host = drain(&mut host_rx);
        assert!(matches!(
            to_host.as_slice(),
            [ServerMessage::RoomState(view)] if view.players.len() == 2
        ));
        let to_joiner = drain(&mut p_rx);
        assert!(matches!(to_joiner[0], ServerMessage::RoomJoined { .. }));
        assert!(matches!(to_joiner[1], ServerMessage::RoomState(_)));
    }

    #[tokio::test]
    async fn test_ready_outside_room_is_rejected() {
        let state = Arc::new(AppState::new());
        let _h = state.hub.register("th");
        let _x = state.hub.register("stranger");
        let code = create(&state, "th", "host").await;

        let reply = handle_message(
            ClientMessage::GameReady { room_code: code },
            "stranger",
            &state,
        )
        .await;
        assert_eq!(error_code(&reply), Some("PLAYER_NOT_FOUND"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_ready_is_absorbed() {
        let state = Arc::new(AppState::new());
        let mut host_rx = state.hub.register("th");
        let _p = state.hub.register("tp");
        let code = create(&state, "th", "host").await;
        join(&state, "tp", &code, "p1").await;
        handle_message(
            ClientMessage::GameStart {
                room_code: code.clone(),
                questions: vec![question("Queen", Some(5))],
                default_time_limit: None,
            },
            "th",
            &state,
        )
        .await;
        drain(&mut host_rx);

        let ready = || ClientMessage::GameReady {
            room_code: code.clone(),
        };
        handle_message(ready(), "tp", &state).await;
        assert_eq!(drain(&mut host_rx).len(), 1);
        handle_message(ready(), "tp", &state).await;
        assert!(drain(&mut host_rx).is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_releases_channel() {
        let state = Arc::new(AppState::new());
        let _h = state.hub.register("th");
        let code = create(&state, "th", "host").await;

        handle_disconnect("th", &state).await;

        assert!(state.hub.channel_of("th").is_none());
        let room = state.store.get(&code).unwrap();
        assert!(!room.lock().await.players[0].connected);
        assert!(state.store.has_grace_timer(&code, "host"));
    }
}
