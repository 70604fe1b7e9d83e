//! Room lifecycle: create, join, rejoin, leave, disconnect and the grace
//! period before a disconnected seat is removed.

use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::store::SharedRoom;
use crate::types::*;
use std::sync::Arc;

use super::round::{self, broadcast_room_state};

/// Look up a room by the code a client sent. Codes are matched uppercase.
pub fn find_room(state: &Arc<AppState>, room_code: &str) -> Result<(RoomCode, SharedRoom), GameError> {
    let code = room_code.trim().to_uppercase();
    match state.store.get(&code) {
        Some(room) => Ok((code, room)),
        None => Err(GameError::RoomNotFound(code)),
    }
}

/// Blank names get a generated one ("clever otter")
fn display_name_or_default(name: &str) -> String {
    match name.trim() {
        "" => petname::petname(2, " ").unwrap_or_else(|| "Player".to_string()),
        name => name.to_string(),
    }
}

/// Drop a room along with its timers and channel
fn delete_room(state: &Arc<AppState>, code: &str) {
    state.store.remove(code);
    state.hub.close_channel(code);
    tracing::info!("Room {} deleted (no players left)", code);
}

/// A socket that enters another room gives up the seat it held before
async fn release_previous_room(state: &Arc<AppState>, transport_id: &str, next_code: &str) {
    if let Some(previous) = state.hub.channel_of(transport_id) {
        if previous != next_code {
            state.hub.leave(transport_id);
            disconnect_from_room(state, transport_id, &previous).await;
        }
    }
}

pub async fn handle_create(
    state: &Arc<AppState>,
    transport_id: &str,
    player_id: String,
    player_name: String,
    avatar: Option<String>,
    categories: Vec<String>,
    default_time_limit: Option<u32>,
) -> Option<ServerMessage> {
    if player_id.trim().is_empty() {
        return Some(GameError::InvalidPlayerId.into());
    }

    let display_name = display_name_or_default(&player_name);
    let default_time_limit = default_time_limit.unwrap_or(state.config.default_time_limit_secs);
    let host = Player::new(player_id, transport_id.to_string(), display_name, avatar);

    let (code, shared) = state.store.create_room(|code| {
        Room::new(code, host, categories, default_time_limit)
    });
    release_previous_room(state, transport_id, &code).await;

    let room = shared.lock().await;
    state.hub.join(transport_id, &code);
    tracing::info!("Room {} created by {}", code, room.host_player_id);

    Some(ServerMessage::RoomCreated {
        room_code: code,
        room_state: room.room_state(now_ms()),
    })
}

pub async fn handle_join(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
    player_id: String,
    player_name: String,
    avatar: Option<String>,
) -> Option<ServerMessage> {
    if player_id.trim().is_empty() {
        return Some(GameError::InvalidPlayerId.into());
    }
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    release_previous_room(state, transport_id, &code).await;

    let mut room = shared.lock().await;
    if room.player(&player_id).is_some() {
        // Known seat: treat as a reconnect, keep score and host flag
        room.reconnect_player(&player_id, transport_id.to_string());
        state.store.cancel_grace_timer(&code, &player_id);
        tracing::info!("Room {}: {} reconnected via join", code, player_id);
    } else {
        let display_name = display_name_or_default(&player_name);
        tracing::info!("Room {}: {} joined as {}", code, player_id, display_name);
        room.add_player(Player::new(
            player_id,
            transport_id.to_string(),
            display_name,
            avatar,
        ));
    }

    enter_room(state, transport_id, &room, |room_code, room_state| {
        ServerMessage::RoomJoined {
            room_code,
            room_state,
        }
    });
    None
}

pub async fn handle_rejoin(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
    player_id: String,
) -> Option<ServerMessage> {
    if player_id.trim().is_empty() {
        return Some(GameError::InvalidPlayerId.into());
    }
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    // Unknown ids are rejected before the socket gives up any other seat
    let known = shared.lock().await.player(&player_id).is_some();
    if !known {
        return Some(GameError::PlayerNotFound.into());
    }
    release_previous_room(state, transport_id, &code).await;

    let mut room = shared.lock().await;
    // The seat can expire while the previous room is released
    if !room.reconnect_player(&player_id, transport_id.to_string()) {
        return Some(GameError::PlayerNotFound.into());
    }
    state.store.cancel_grace_timer(&code, &player_id);
    tracing::info!("Room {}: {} rejoined", code, player_id);

    enter_room(state, transport_id, &room, |room_code, room_state| {
        ServerMessage::RoomRejoined {
            room_code,
            room_state,
        }
    });
    None
}

/// Subscribe the socket, reply, replay any running round to it, then tell
/// everyone about the new roster. The reply is queued here rather than
/// returned so it reaches the client ahead of the replay.
fn enter_room(
    state: &Arc<AppState>,
    transport_id: &str,
    room: &Room,
    reply: impl FnOnce(RoomCode, crate::protocol::RoomStateView) -> ServerMessage,
) {
    state.hub.join(transport_id, &room.code);
    state
        .hub
        .send_to(transport_id, reply(room.code.clone(), room.room_state(now_ms())));
    if room.phase == RoomPhase::Playing {
        round::replay_round(state, room, transport_id);
    }
    broadcast_room_state(state, room);
}

pub async fn handle_leave(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
) -> Option<ServerMessage> {
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    let mut room = shared.lock().await;
    let Some(player_id) = room.player_by_transport(transport_id).map(|p| p.id.clone()) else {
        return Some(GameError::PlayerNotFound.into());
    };

    room.remove_player(&player_id);
    state.store.cancel_grace_timer(&code, &player_id);
    state.hub.leave(transport_id);
    tracing::info!("Room {}: {} left", code, player_id);

    if room.is_empty() {
        delete_room(state, &code);
        return None;
    }
    broadcast_room_state(state, &room);
    round::reevaluate_consensus(state, &mut room);
    None
}

pub async fn handle_update_player_name(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
    player_name: String,
) -> Option<ServerMessage> {
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    let mut room = shared.lock().await;
    let Some(player) = room.player_by_transport_mut(transport_id) else {
        return Some(GameError::PlayerNotFound.into());
    };

    let name = player_name.trim();
    if name.is_empty() {
        return None;
    }
    tracing::debug!("Room {}: {} renamed to {}", code, player.id, name);
    player.display_name = name.to_string();
    room.touch();

    broadcast_room_state(state, &room);
    None
}

/// Socket closed. Unsubscribes it and starts the grace period for its seat.
pub async fn handle_disconnect(state: &Arc<AppState>, transport_id: &str) {
    let Some(code) = state.hub.unregister(transport_id) else {
        return;
    };
    disconnect_from_room(state, transport_id, &code).await;
}

async fn disconnect_from_room(state: &Arc<AppState>, transport_id: &str, code: &str) {
    let Some(shared) = state.store.get(code) else {
        return;
    };
    let mut room = shared.lock().await;
    let Some((player_id, _)) = room.disconnect_transport(transport_id) else {
        return;
    };
    tracing::info!(
        "Room {}: {} disconnected, removal in {:?}",
        code,
        player_id,
        state.config.grace_period
    );

    schedule_grace_removal(state, code, &player_id);
    broadcast_room_state(state, &room);
    round::reevaluate_consensus(state, &mut room);
}

/// Arm the grace timer for a disconnected seat; called with the room locked
fn schedule_grace_removal(state: &Arc<AppState>, code: &str, player_id: &str) {
    let timer_id = ulid::Ulid::new().to_string();
    let task = tokio::spawn({
        let state = state.clone();
        let code = code.to_string();
        let player_id = player_id.to_string();
        let timer_id = timer_id.clone();
        async move {
            tokio::time::sleep(state.config.grace_period).await;
            expire_grace_period(&state, &code, &player_id, &timer_id).await;
        }
    });
    state
        .store
        .set_grace_timer(code, player_id, timer_id, task.abort_handle());
}

async fn expire_grace_period(state: &Arc<AppState>, code: &str, player_id: &str, timer_id: &str) {
    let Some(shared) = state.store.get(code) else {
        return;
    };
    let mut room = shared.lock().await;
    if !state.store.take_grace_timer(code, player_id, timer_id) {
        return;
    }
    if room.player(player_id).map_or(true, |p| p.connected) {
        return;
    }

    room.remove_player(player_id);
    tracing::info!("Room {}: {} removed after grace period", code, player_id);

    if room.is_empty() {
        delete_room(state, code);
        return;
    }
    broadcast_room_state(state, &room);
    round::reevaluate_consensus(state, &mut room);
}
