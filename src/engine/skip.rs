use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipVote {
    pub player_id: PlayerId,
    /// False when this player had already voted in the current phase
    pub voted: bool,
    pub skip_votes: usize,
    pub all_players_voted: bool,
}

impl Room {
    /// Count the socket's player towards ending the current phase early
    pub fn vote_skip(&mut self, transport_id: &str) -> Option<SkipVote> {
        let player_id = self.player_by_transport(transport_id)?.id.clone();
        let round = self.round_mut()?;
        let voted = round.skip_voter_ids.insert(player_id.clone());
        let skip_votes = round.skip_voter_ids.len();

        Some(SkipVote {
            player_id,
            voted,
            skip_votes,
            all_players_voted: self.skip_consensus(),
        })
    }

    /// Every currently connected player has voted to skip.
    ///
    /// Recomputed on demand, so players connecting or dropping mid-phase
    /// change the outcome.
    pub fn skip_consensus(&self) -> bool {
        let Some(round) = self.round() else {
            return false;
        };
        let connected = self.connected_player_ids();
        !connected.is_empty() && connected.is_subset(&round.skip_voter_ids)
    }

    /// Clear skip votes; called on every phase or question change
    pub fn reset_skip_votes(&mut self) {
        if let Some(round) = self.round_mut() {
            round.skip_voter_ids.clear();
        }
    }
}
