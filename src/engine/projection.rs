use crate::protocol::{RoomStateView, RoundStep, RoundView};
use crate::types::*;

impl Room {
    /// Project the room for clients. Recomputed on every call.
    pub fn room_state(&self, now: Millis) -> RoomStateView {
        RoomStateView {
            code: self.code.clone(),
            host_player_id: self.host_player_id.clone(),
            phase: self.phase,
            players: self.players.clone(),
            categories: self.categories.clone(),
            current_question_index: self.current_question_index,
            total_questions: self.questions.len(),
            current_question: self.current_question().cloned(),
            default_time_limit: self.default_time_limit_seconds,
            round: self.round().map(|round| self.round_view(round, now)),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn round_view(&self, round: &Round, now: Millis) -> RoundView {
        let connected = self.connected_player_ids();
        let ready_count = connected
            .iter()
            .filter(|id| round.ready_player_ids.contains(*id))
            .count();
        let all_ready = !connected.is_empty() && ready_count == connected.len();

        let mut answered_player_ids: Vec<PlayerId> = round.answers.keys().cloned().collect();
        answered_player_ids.sort();

        let mut view = RoundView {
            question_index: round.question_index,
            step: RoundStep::Loading,
            duration_ms: round.duration_ms,
            started_at: round.started_at,
            go_at: round.go_at,
            time_remaining_ms: None,
            server_time: None,
            ready_count: None,
            total_players: None,
            skip_votes: round.skip_voter_ids.len(),
            answered_player_ids,
            validated_answers: round.validated_answers.clone(),
        };

        match (round.started_at, round.go_at) {
            (Some(started_at), _) if round.duration_ms > 0 => {
                view.step = RoundStep::Playing;
                view.time_remaining_ms = Some(time_remaining_ms(started_at, round.duration_ms, now));
                view.server_time = Some(now);
            }
            (_, Some(_)) => view.step = RoundStep::Starting,
            _ => {
                view.step = if all_ready {
                    RoundStep::Ready
                } else {
                    RoundStep::Loading
                };
                view.ready_count = Some(ready_count);
                view.total_players = Some(connected.len());
            }
        }

        view
    }

    /// Clock numbers for a client joining a running guess phase
    pub fn guess_sync(&self, now: Millis) -> Option<(Millis, u64, u64)> {
        let round = self.round()?;
        if round.is_validated() {
            return None;
        }
        let started_at = round.started_at?;
        Some((
            started_at,
            round.duration_ms,
            time_remaining_ms(started_at, round.duration_ms, now),
        ))
    }
}

/// `durationMs - (now - startedAt)` floored at zero. Elapsed time is clamped
/// at zero too, so the go countdown reports the full duration.
pub fn time_remaining_ms(started_at: Millis, duration_ms: u64, now: Millis) -> u64 {
    let elapsed = u64::try_from(now - started_at).unwrap_or(0);
    duration_ms.saturating_sub(elapsed)
}
