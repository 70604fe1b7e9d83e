use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inbound events. The event name travels in `t`, payload fields are camelCase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t")]
pub enum ClientMessage {
    #[serde(rename = "room:create", rename_all = "camelCase")]
    RoomCreate {
        player_id: PlayerId,
        #[serde(default)]
        player_name: String,
        #[serde(default)]
        avatar: Option<String>,
        #[serde(default)]
        categories: Vec<String>,
        #[serde(default)]
        default_time_limit: Option<u32>,
    },
    #[serde(rename = "room:join", rename_all = "camelCase")]
    RoomJoin {
        room_code: RoomCode,
        player_id: PlayerId,
        #[serde(default)]
        player_name: String,
        #[serde(default)]
        avatar: Option<String>,
    },
    #[serde(rename = "room:rejoin", rename_all = "camelCase")]
    RoomRejoin {
        room_code: RoomCode,
        player_id: PlayerId,
    },
    #[serde(rename = "room:leave", rename_all = "camelCase")]
    RoomLeave { room_code: RoomCode },
    #[serde(rename = "update-player-name", rename_all = "camelCase")]
    UpdatePlayerName {
        room_code: RoomCode,
        player_name: String,
    },
    // Host-only
    #[serde(rename = "game:start", rename_all = "camelCase")]
    GameStart {
        room_code: RoomCode,
        questions: Vec<Question>,
        #[serde(default)]
        default_time_limit: Option<u32>,
    },
    #[serde(rename = "game:restart", rename_all = "camelCase")]
    GameRestart { room_code: RoomCode },
    #[serde(rename = "game:restart-with-categories", rename_all = "camelCase")]
    GameRestartWithCategories {
        room_code: RoomCode,
        questions: Vec<Question>,
        #[serde(default)]
        categories: Vec<String>,
        #[serde(default)]
        default_time_limit: Option<u32>,
    },
    #[serde(rename = "game:next", rename_all = "camelCase")]
    GameNext { room_code: RoomCode },
    // Any player
    #[serde(rename = "game:ready", rename_all = "camelCase")]
    GameReady { room_code: RoomCode },
    #[serde(rename = "game:answer", rename_all = "camelCase")]
    GameAnswer { room_code: RoomCode, answer: String },
    #[serde(rename = "game:skip-vote", rename_all = "camelCase")]
    GameSkipVote { room_code: RoomCode },
    #[serde(rename = "game:get-state", rename_all = "camelCase")]
    GameGetState { room_code: RoomCode },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "t")]
pub enum ServerMessage {
    #[serde(rename = "room:created", rename_all = "camelCase")]
    RoomCreated {
        room_code: RoomCode,
        room_state: RoomStateView,
    },
    #[serde(rename = "room:joined", rename_all = "camelCase")]
    RoomJoined {
        room_code: RoomCode,
        room_state: RoomStateView,
    },
    #[serde(rename = "room:rejoined", rename_all = "camelCase")]
    RoomRejoined {
        room_code: RoomCode,
        room_state: RoomStateView,
    },
    #[serde(rename = "room:state")]
    RoomState(RoomStateView),
    #[serde(rename = "game:start", rename_all = "camelCase")]
    GameStart {
        current_question: Question,
        questions: Vec<Question>,
        question_index: usize,
        players: Vec<Player>,
        duration_ms: u64,
    },
    #[serde(rename = "game:go", rename_all = "camelCase")]
    GameGo {
        go_at: Millis,
        started_at: Millis,
        duration_ms: u64,
        server_time: Millis,
    },
    /// Sent only to clients that need to catch up with a running guess phase
    #[serde(rename = "game:sync", rename_all = "camelCase")]
    GameSync {
        started_at: Millis,
        duration_ms: u64,
        time_remaining_ms: u64,
        server_time: Millis,
        question_index: usize,
    },
    #[serde(rename = "game:answer-stored", rename_all = "camelCase")]
    GameAnswerStored { player_id: PlayerId },
    #[serde(rename = "game:skip-vote-updated", rename_all = "camelCase")]
    GameSkipVoteUpdated {
        player_id: PlayerId,
        skip_votes: usize,
        all_players_voted: bool,
    },
    #[serde(rename = "game:answers-validated", rename_all = "camelCase")]
    GameAnswersValidated {
        validated_answers: BTreeMap<PlayerId, bool>,
        correct_players: Vec<PlayerId>,
        players: Vec<Player>,
    },
    #[serde(rename = "game:reveal", rename_all = "camelCase")]
    GameReveal {
        question_index: usize,
        duration_ms: u64,
    },
    #[serde(rename = "game:next", rename_all = "camelCase")]
    GameNext {
        current_question: Question,
        question_index: usize,
        duration_ms: u64,
    },
    /// Final standings, highest score first
    #[serde(rename = "game:end", rename_all = "camelCase")]
    GameEnd { players: Vec<Player> },
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

/// Full room projection sent as `room:state` and inside join replies
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateView {
    pub code: RoomCode,
    pub host_player_id: PlayerId,
    pub phase: RoomPhase,
    pub players: Vec<Player>,
    pub categories: Vec<String>,
    pub current_question_index: usize,
    pub total_questions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<Question>,
    pub default_time_limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundView>,
    pub created_at: Millis,
    pub updated_at: Millis,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundStep {
    Loading,
    Ready,
    Starting,
    Playing,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub question_index: usize,
    pub step: RoundStep,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Millis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_at: Option<Millis>,
    /// Only while playing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<Millis>,
    /// Only while loading or ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_players: Option<usize>,
    pub skip_votes: usize,
    pub answered_player_ids: Vec<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_answers: Option<BTreeMap<PlayerId, bool>>,
}
