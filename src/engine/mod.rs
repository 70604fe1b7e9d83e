//! Synchronous game transitions over a [`Room`].
//!
//! Nothing in here performs I/O, reads timers or locks anything: the caller
//! holds the room exclusively for the duration of each call. Operations that
//! the coordinators absorb silently (duplicates, stale triggers) return
//! `Option`, operations with a client-facing precondition return `Result`.

mod answers;
mod projection;
mod skip;

pub use answers::Validation;
pub use skip::SkipVote;

use crate::error::GameError;
use crate::types::*;

/// Outcome of advancing past the current question
#[derive(Debug, Clone, PartialEq)]
pub enum NextQuestion {
    Finished {
        /// Highest score first, ties in join order
        players: Vec<Player>,
    },
    Next {
        current_question: Question,
        question_index: usize,
        duration_ms: u64,
    },
}

/// Timestamps produced when the ready barrier opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoSignal {
    pub go_at: Millis,
    pub started_at: Millis,
    pub duration_ms: u64,
    pub server_time: Millis,
}

impl Room {
    /// Waiting -> Playing with the given question set. Started again from
    /// Playing or Finished it behaves as a restart: scores are zeroed.
    pub fn start_game(
        &mut self,
        questions: Vec<Question>,
        default_time_limit_seconds: u32,
    ) -> Result<(), GameError> {
        if questions.is_empty() {
            return Err(GameError::NoQuestions);
        }
        if self.phase != RoomPhase::Waiting {
            self.reset_scores();
        }
        self.questions = questions;
        self.default_time_limit_seconds = default_time_limit_seconds;
        self.begin_game();
        Ok(())
    }

    /// Replay the current question set from the start with scores zeroed
    pub fn restart_game(&mut self) -> Result<(), GameError> {
        if self.questions.is_empty() {
            return Err(GameError::NoQuestions);
        }
        self.reset_scores();
        self.begin_game();
        Ok(())
    }

    /// Restart with a new question set and categories, scores zeroed
    pub fn restart_game_with_categories(
        &mut self,
        questions: Vec<Question>,
        categories: Vec<String>,
        default_time_limit_seconds: u32,
    ) -> Result<(), GameError> {
        if questions.is_empty() {
            return Err(GameError::NoQuestions);
        }
        self.categories = categories;
        self.reset_scores();
        self.start_game(questions, default_time_limit_seconds)
    }

    fn reset_scores(&mut self) {
        for player in self.players.iter_mut() {
            player.score = 0;
        }
    }

    fn begin_game(&mut self) {
        self.phase = RoomPhase::Playing;
        self.current_question_index = 0;
        let duration_ms = self.questions[0].duration_ms(self.default_time_limit_seconds);
        self.game = Some(Round::new(0, duration_ms));
        self.touch();
        tracing::info!(
            "Room {}: game started with {} questions",
            self.code,
            self.questions.len()
        );
    }

    /// The question being played, if any
    pub fn current_question(&self) -> Option<&Question> {
        if self.phase != RoomPhase::Playing {
            return None;
        }
        self.questions.get(self.current_question_index)
    }

    /// The round, but only while Playing
    pub fn round(&self) -> Option<&Round> {
        match self.phase {
            RoomPhase::Playing => self.game.as_ref(),
            _ => None,
        }
    }

    fn round_mut(&mut self) -> Option<&mut Round> {
        match self.phase {
            RoomPhase::Playing => self.game.as_mut(),
            _ => None,
        }
    }

    /// Record that the socket's client has buffered the media.
    /// Returns the player id only the first time that player becomes ready.
    pub fn mark_ready(&mut self, transport_id: &str) -> Option<PlayerId> {
        let player = self.player_by_transport(transport_id)?;
        if !player.connected {
            return None;
        }
        let player_id = player.id.clone();
        let round = self.round_mut()?;
        if !round.ready_player_ids.insert(player_id.clone()) {
            return None;
        }
        Some(player_id)
    }

    /// Every connected player is ready, and there is at least one
    pub fn all_connected_ready(&self) -> bool {
        let Some(round) = self.round() else {
            return false;
        };
        let connected = self.connected_player_ids();
        !connected.is_empty() && connected.is_subset(&round.ready_player_ids)
    }

    /// Open the ready barrier if it is satisfied and has not opened yet for
    /// this question. Sets `goAt` and `startedAt` together, exactly once.
    pub fn open_barrier(&mut self, now: Millis, go_delay_ms: u64) -> Option<GoSignal> {
        if !self.all_connected_ready() {
            return None;
        }
        let round = self.round_mut()?;
        if round.go_at.is_some() {
            return None;
        }
        let go_at = now + go_delay_ms as Millis;
        round.go_at = Some(go_at);
        round.started_at = Some(go_at);
        // Votes from the loading stage never carry into the guess phase
        round.skip_voter_ids.clear();
        Some(GoSignal {
            go_at,
            started_at: go_at,
            duration_ms: round.duration_ms,
            server_time: now,
        })
    }

    /// Move to the next question, or finish the game after the last one
    pub fn next_question(&mut self) -> Option<NextQuestion> {
        if self.phase != RoomPhase::Playing {
            return None;
        }

        self.current_question_index += 1;
        self.touch();

        if self.current_question_index >= self.questions.len() {
            self.phase = RoomPhase::Finished;
            self.game = None;
            // Stable sort keeps join order for equal scores
            let mut players = self.players.clone();
            players.sort_by(|a, b| b.score.cmp(&a.score));
            tracing::info!("Room {}: game finished", self.code);
            return Some(NextQuestion::Finished { players });
        }

        let question_index = self.current_question_index;
        let current_question = self.questions[question_index].clone();
        let duration_ms = current_question.duration_ms(self.default_time_limit_seconds);
        self.game = Some(Round::new(question_index, duration_ms));

        Some(NextQuestion::Next {
            current_question,
            question_index,
            duration_ms,
        })
    }
}
