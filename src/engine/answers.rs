use crate::answer;
use crate::types::*;
use std::collections::BTreeMap;

/// Result of scoring the buffered answers of one question
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub validated_answers: BTreeMap<PlayerId, bool>,
    pub correct_players: Vec<PlayerId>,
    pub players: Vec<Player>,
}

impl Room {
    /// Buffer the socket's answer for the current question, replacing any
    /// earlier one. Scoring happens only in [`Room::validate_answers`].
    /// Answers arriving after validation are dropped.
    pub fn store_answer(&mut self, transport_id: &str, text: String) -> Option<PlayerId> {
        let player_id = self.player_by_transport(transport_id)?.id.clone();
        let round = self.round_mut()?;
        if round.is_validated() {
            return None;
        }
        round.answers.insert(player_id.clone(), text);
        Some(player_id)
    }

    /// Score the buffered answers once per question.
    ///
    /// A second call for the same question returns `None` without touching
    /// scores; this is what makes racing end-of-guess triggers harmless.
    pub fn validate_answers(&mut self) -> Option<Validation> {
        let expected = self.current_question()?.answer.clone();
        let round = self.round()?;
        if round.is_validated() {
            return None;
        }

        // Answers of players removed since they were buffered are ignored
        let mut validated_answers = BTreeMap::new();
        for (player_id, text) in &round.answers {
            if self.player(player_id).is_some() {
                validated_answers.insert(player_id.clone(), answer::compare(text, &expected));
            }
        }

        let mut correct_players = Vec::new();
        for player in self.players.iter_mut() {
            if validated_answers.get(&player.id) == Some(&true) {
                player.score += 1;
                correct_players.push(player.id.clone());
            }
        }

        if let Some(round) = self.round_mut() {
            round.validated_answers = Some(validated_answers.clone());
        }
        self.touch();

        tracing::info!(
            "Room {}: question {} validated, {} correct",
            self.code,
            self.current_question_index,
            correct_players.len()
        );

        Some(Validation {
            validated_answers,
            correct_players,
            players: self.players.clone(),
        })
    }
}
