use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Opaque ID types for type safety
pub type RoomCode = String;
pub type PlayerId = String;
pub type TransportId = String;
pub type RoundId = String;
pub type QuestionId = String;

/// Milliseconds since the Unix epoch, as sent to clients
pub type Millis = i64;

/// Current wall-clock time in epoch milliseconds
pub fn now_ms() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    Waiting,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    /// Socket currently bound to this seat; `None` while disconnected
    #[serde(skip)]
    pub transport_id: Option<TransportId>,
    pub display_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub score: u32,
    pub is_host: bool,
    pub connected: bool,
    pub disconnected_at: Option<Millis>,
}

impl Player {
    pub fn new(
        id: PlayerId,
        transport_id: TransportId,
        display_name: String,
        avatar: Option<String>,
    ) -> Self {
        Self {
            id,
            transport_id: Some(transport_id),
            display_name,
            avatar,
            score: 0,
            is_host: false,
            connected: true,
            disconnected_at: None,
        }
    }
}

/// A question as supplied by the question store.
///
/// Only `answer` and `timeLimit` matter to round synchronization; media fields
/// and anything else the client attached are passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: Option<QuestionId>,
    pub answer: String,
    /// Per-question guess time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Question {
    pub fn duration_ms(&self, default_time_limit_seconds: u32) -> u64 {
        u64::from(self.time_limit.unwrap_or(default_time_limit_seconds)) * 1000
    }
}

/// Per-question synchronization state. Exists iff the room is Playing.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    /// Fresh for every question; timers compare against it before acting
    pub id: RoundId,
    pub question_index: usize,
    pub started_at: Option<Millis>,
    pub go_at: Option<Millis>,
    pub duration_ms: u64,
    /// Buffered answers, last write wins
    pub answers: HashMap<PlayerId, String>,
    pub ready_player_ids: BTreeSet<PlayerId>,
    pub skip_voter_ids: BTreeSet<PlayerId>,
    /// `Some` once the guess phase has been scored; doubles as the advance guard
    pub validated_answers: Option<BTreeMap<PlayerId, bool>>,
}

impl Round {
    pub fn new(question_index: usize, duration_ms: u64) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            question_index,
            started_at: None,
            go_at: None,
            duration_ms,
            answers: HashMap::new(),
            ready_player_ids: BTreeSet::new(),
            skip_voter_ids: BTreeSet::new(),
            validated_answers: None,
        }
    }

    pub fn is_validated(&self) -> bool {
        self.validated_answers.is_some()
    }

    /// Which timed sub-phase the round is in
    pub fn stage(&self) -> RoundStage {
        match (self.started_at, self.is_validated()) {
            (_, true) => RoundStage::Reveal,
            (Some(_), false) => RoundStage::Guess,
            (None, false) => RoundStage::Loading,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStage {
    /// Waiting for every connected client to buffer the media
    Loading,
    Guess,
    Reveal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub code: RoomCode,
    pub host_player_id: PlayerId,
    /// Join order is significant: host transfer and score ties use it
    pub players: Vec<Player>,
    pub categories: Vec<String>,
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    pub phase: RoomPhase,
    pub default_time_limit_seconds: u32,
    pub game: Option<Round>,
    pub created_at: Millis,
    pub updated_at: Millis,
}
