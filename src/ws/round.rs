//! Round synchronization: start, ready barrier, guess and reveal timers,
//! skip consensus and question advance.
//!
//! Every entry point locks the room for its whole run, so a timer firing and
//! a player event for the same room never interleave. Each room has at most
//! one round timer; arming always cancels the previous one first, and a
//! firing timer re-checks the round id and stage before it acts.

use crate::engine::NextQuestion;
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::*;
use std::sync::Arc;
use std::time::Duration;

use super::room::find_room;

/// Return UNAUTHORIZED from the handler unless the socket belongs to the host
macro_rules! check_host {
    ($room:expr, $transport_id:expr, $action:expr) => {
        if !$room.is_host_transport($transport_id) {
            return Some(GameError::Unauthorized($action).into());
        }
    };
}

/// Player id bound to the socket, or PLAYER_NOT_FOUND
fn require_player(room: &Room, transport_id: &str) -> Result<PlayerId, GameError> {
    room.player_by_transport(transport_id)
        .map(|p| p.id.clone())
        .ok_or(GameError::PlayerNotFound)
}

/// Full room projection to everyone in the room
pub(super) fn broadcast_room_state(state: &Arc<AppState>, room: &Room) {
    state
        .hub
        .broadcast(&room.code, ServerMessage::RoomState(room.room_state(now_ms())));
}

fn game_start_message(room: &Room) -> Option<ServerMessage> {
    let round = room.round()?;
    Some(ServerMessage::GameStart {
        current_question: room.current_question()?.clone(),
        questions: room.questions.clone(),
        question_index: round.question_index,
        players: room.players.clone(),
        duration_ms: round.duration_ms,
    })
}

/// Broadcast a freshly (re)started game: what changed, then the full state
fn announce_start(state: &Arc<AppState>, room: &Room) {
    if let Some(msg) = game_start_message(room) {
        state.hub.broadcast(&room.code, msg);
    }
    broadcast_room_state(state, room);
}

/// Bring a single client up to the shared round state (late join, rejoin)
pub fn replay_round(state: &Arc<AppState>, room: &Room, transport_id: &str) {
    let Some(start) = game_start_message(room) else {
        return;
    };
    state.hub.send_to(transport_id, start);

    let Some(round) = room.round() else {
        return;
    };
    let now = now_ms();
    match round.stage() {
        RoundStage::Loading => {}
        RoundStage::Guess => {
            if let (Some(go_at), Some(started_at)) = (round.go_at, round.started_at) {
                state.hub.send_to(
                    transport_id,
                    ServerMessage::GameGo {
                        go_at,
                        started_at,
                        duration_ms: round.duration_ms,
                        server_time: now,
                    },
                );
            }
            send_sync(state, room, transport_id, now);
        }
        RoundStage::Reveal => state.hub.send_to(
            transport_id,
            ServerMessage::GameReveal {
                question_index: round.question_index,
                duration_ms: round.duration_ms,
            },
        ),
    }
}

fn send_sync(state: &Arc<AppState>, room: &Room, transport_id: &str, now: Millis) {
    if let Some((started_at, duration_ms, time_remaining_ms)) = room.guess_sync(now) {
        state.hub.send_to(
            transport_id,
            ServerMessage::GameSync {
                started_at,
                duration_ms,
                time_remaining_ms,
                server_time: now,
                question_index: room.current_question_index,
            },
        );
    }
}

pub async fn handle_start_game(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
    questions: Vec<Question>,
    default_time_limit: Option<u32>,
) -> Option<ServerMessage> {
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    let mut room = shared.lock().await;
    check_host!(room, transport_id, "start the game");

    let default_time_limit = default_time_limit.unwrap_or(room.default_time_limit_seconds);
    if let Err(e) = room.start_game(questions, default_time_limit) {
        tracing::warn!("Room {}: start rejected: {}", code, e);
        return Some(e.into());
    }

    state.store.cancel_round_timer(&code);
    announce_start(state, &room);
    None
}

pub async fn handle_restart_game(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
) -> Option<ServerMessage> {
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    let mut room = shared.lock().await;
    check_host!(room, transport_id, "restart the game");
    if let Err(e) = room.restart_game() {
        return Some(e.into());
    }

    tracing::info!("Room {}: game restarted", code);
    state.store.cancel_round_timer(&code);
    announce_start(state, &room);
    None
}

pub async fn handle_restart_with_categories(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
    questions: Vec<Question>,
    categories: Vec<String>,
    default_time_limit: Option<u32>,
) -> Option<ServerMessage> {
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    let mut room = shared.lock().await;
    check_host!(room, transport_id, "restart the game");

    let default_time_limit = default_time_limit.unwrap_or(room.default_time_limit_seconds);
    if let Err(e) = room.restart_game_with_categories(questions, categories, default_time_limit) {
        return Some(e.into());
    }

    tracing::info!("Room {}: game restarted with new categories", code);
    state.store.cancel_round_timer(&code);
    announce_start(state, &room);
    None
}

pub async fn handle_ready(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
) -> Option<ServerMessage> {
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    let mut room = shared.lock().await;
    if let Err(e) = require_player(&room, transport_id) {
        return Some(e.into());
    }

    let Some(player_id) = room.mark_ready(transport_id) else {
        tracing::debug!("Room {}: duplicate or out-of-round ready ignored", code);
        return None;
    };
    tracing::debug!("Room {}: {} is ready", code, player_id);

    broadcast_room_state(state, &room);
    try_open_barrier(state, &mut room);
    None
}

/// Open the ready barrier if every connected player is ready: announce the
/// go signal and arm the guess timer against `startedAt`.
fn try_open_barrier(state: &Arc<AppState>, room: &mut Room) {
    let now = now_ms();
    let Some(go) = room.open_barrier(now, state.config.go_delay_ms()) else {
        return;
    };

    tracing::info!(
        "Room {}: all players ready, go at {} for {}ms",
        room.code,
        go.go_at,
        go.duration_ms
    );
    state.hub.broadcast(
        &room.code,
        ServerMessage::GameGo {
            go_at: go.go_at,
            started_at: go.started_at,
            duration_ms: go.duration_ms,
            server_time: go.server_time,
        },
    );

    // Deadline derives from startedAt, not from when this line runs
    let deadline = go.started_at + go.duration_ms as Millis;
    let delay = Duration::from_millis(u64::try_from(deadline - now_ms()).unwrap_or(0));
    arm_round_timer(state, room, RoundStage::Guess, delay);
}

/// Schedule the end of the current timed stage. Must be called with the room
/// locked, which keeps the new task from acting before it is registered.
fn arm_round_timer(state: &Arc<AppState>, room: &Room, stage: RoundStage, delay: Duration) {
    let Some(round) = room.round() else {
        return;
    };
    state.store.cancel_round_timer(&room.code);

    let timer_id = ulid::Ulid::new().to_string();
    let task = tokio::spawn({
        let state = state.clone();
        let code = room.code.clone();
        let round_id = round.id.clone();
        let timer_id = timer_id.clone();
        async move {
            tokio::time::sleep(delay).await;
            on_round_timer(&state, &code, &timer_id, &round_id, stage).await;
        }
    });
    state
        .store
        .set_round_timer(&room.code, timer_id, task.abort_handle());
}

async fn on_round_timer(
    state: &Arc<AppState>,
    code: &str,
    timer_id: &str,
    round_id: &str,
    stage: RoundStage,
) {
    let Some(shared) = state.store.get(code) else {
        return;
    };
    let mut room = shared.lock().await;

    if !state.store.take_round_timer(code, timer_id) {
        tracing::debug!("Room {}: superseded round timer dropped", code);
        return;
    }
    let current = room.round().map(|r| (r.id.clone(), r.stage()));
    if current != Some((round_id.to_string(), stage)) {
        tracing::debug!("Room {}: stale {:?} timer dropped", code, stage);
        return;
    }

    match stage {
        RoundStage::Guess => end_guess_phase(state, &mut room),
        RoundStage::Reveal => end_reveal_phase(state, &mut room),
        RoundStage::Loading => {}
    }
}

/// Guess -> reveal. A round that is already validated means another trigger
/// got here first; nothing happens then.
fn end_guess_phase(state: &Arc<AppState>, room: &mut Room) {
    state.store.cancel_round_timer(&room.code);
    let Some(validation) = room.validate_answers() else {
        tracing::debug!("Room {}: guess phase already ended", room.code);
        return;
    };

    state.hub.broadcast(
        &room.code,
        ServerMessage::GameAnswersValidated {
            validated_answers: validation.validated_answers,
            correct_players: validation.correct_players,
            players: validation.players,
        },
    );
    room.reset_skip_votes();

    let Some(round) = room.round() else {
        return;
    };
    let duration_ms = round.duration_ms;
    tracing::info!("Room {}: reveal for {}ms", room.code, duration_ms);
    state.hub.broadcast(
        &room.code,
        ServerMessage::GameReveal {
            question_index: round.question_index,
            duration_ms,
        },
    );
    arm_round_timer(
        state,
        room,
        RoundStage::Reveal,
        Duration::from_millis(duration_ms),
    );
}

/// Reveal -> next question (or game end). No timer is armed for the new
/// question until its ready barrier opens.
fn end_reveal_phase(state: &Arc<AppState>, room: &mut Room) {
    state.store.cancel_round_timer(&room.code);
    match room.next_question() {
        None => {}
        Some(NextQuestion::Finished { players }) => {
            state
                .hub
                .broadcast(&room.code, ServerMessage::GameEnd { players });
        }
        Some(NextQuestion::Next {
            current_question,
            question_index,
            duration_ms,
        }) => {
            tracing::info!("Room {}: question {}", room.code, question_index);
            state.hub.broadcast(
                &room.code,
                ServerMessage::GameNext {
                    current_question,
                    question_index,
                    duration_ms,
                },
            );
            broadcast_room_state(state, room);
        }
    }
}

/// End whichever timed stage is running because everyone voted to skip
fn complete_skip(state: &Arc<AppState>, room: &mut Room) {
    match room.round().map(|r| r.stage()) {
        Some(RoundStage::Guess) => end_guess_phase(state, room),
        Some(RoundStage::Reveal) => end_reveal_phase(state, room),
        // Votes before the go signal are kept but end nothing
        Some(RoundStage::Loading) | None => {}
    }
}

/// Re-check the ready barrier and skip consensus after the set of connected
/// players changed
pub fn reevaluate_consensus(state: &Arc<AppState>, room: &mut Room) {
    try_open_barrier(state, room);
    if room.skip_consensus() {
        tracing::info!("Room {}: skip consensus after player change", room.code);
        complete_skip(state, room);
    }
}

pub async fn handle_answer(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
    answer: String,
) -> Option<ServerMessage> {
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    let mut room = shared.lock().await;
    if let Err(e) = require_player(&room, transport_id) {
        return Some(e.into());
    }

    let player_id = room.store_answer(transport_id, answer)?;
    tracing::debug!("Room {}: answer stored for {}", code, player_id);
    state
        .hub
        .broadcast(&code, ServerMessage::GameAnswerStored { player_id });
    None
}

pub async fn handle_skip_vote(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
) -> Option<ServerMessage> {
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    let mut room = shared.lock().await;
    if let Err(e) = require_player(&room, transport_id) {
        return Some(e.into());
    }

    let vote = room.vote_skip(transport_id)?;
    if !vote.voted {
        tracing::debug!("Room {}: repeated skip vote from {}", code, vote.player_id);
        return None;
    }

    state.hub.broadcast(
        &code,
        ServerMessage::GameSkipVoteUpdated {
            player_id: vote.player_id,
            skip_votes: vote.skip_votes,
            all_players_voted: vote.all_players_voted,
        },
    );
    if vote.all_players_voted {
        tracing::info!("Room {}: unanimous skip", code);
        complete_skip(state, &mut room);
    }
    None
}

/// Host forces the next question; unscored answers are validated first
pub async fn handle_next(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
) -> Option<ServerMessage> {
    let (code, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    let mut room = shared.lock().await;
    check_host!(room, transport_id, "advance the game");
    if room.phase != RoomPhase::Playing {
        return None;
    }

    tracing::info!("Room {}: host advanced manually", code);
    state.store.cancel_round_timer(&code);
    if let Some(validation) = room.validate_answers() {
        state.hub.broadcast(
            &code,
            ServerMessage::GameAnswersValidated {
                validated_answers: validation.validated_answers,
                correct_players: validation.correct_players,
                players: validation.players,
            },
        );
    }
    end_reveal_phase(state, &mut room);
    None
}

/// Full state to the requester, plus clock sync if a guess phase is running
pub async fn handle_get_state(
    state: &Arc<AppState>,
    transport_id: &str,
    room_code: &str,
) -> Option<ServerMessage> {
    let (_, shared) = match find_room(state, room_code) {
        Ok(found) => found,
        Err(e) => return Some(e.into()),
    };
    let room = shared.lock().await;
    let now = now_ms();
    state
        .hub
        .send_to(transport_id, ServerMessage::RoomState(room.room_state(now)));
    send_sync(state, &room, transport_id, now);
    None
}
