use crate::protocol::ServerMessage;

/// Precondition failures reported back to the client that sent the event.
///
/// Nothing is mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Only the host can {0}")]
    Unauthorized(&'static str),

    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Cannot start a game without questions")]
    NoQuestions,

    #[error("A player id is required")]
    InvalidPlayerId,

    #[error("Player not found in room")]
    PlayerNotFound,
}

impl GameError {
    /// Wire error code
    pub fn code(&self) -> &'static str {
        match self {
            GameError::Unauthorized(_) => "UNAUTHORIZED",
            GameError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            GameError::NoQuestions => "NO_QUESTIONS",
            GameError::InvalidPlayerId => "INVALID_PLAYER_ID",
            GameError::PlayerNotFound => "PLAYER_NOT_FOUND",
        }
    }
}

impl From<GameError> for ServerMessage {
    fn from(err: GameError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(GameError::Unauthorized("start").code(), "UNAUTHORIZED");
        assert_eq!(GameError::RoomNotFound("X".into()).code(), "ROOM_NOT_FOUND");
        assert_eq!(GameError::NoQuestions.code(), "NO_QUESTIONS");
        assert_eq!(GameError::InvalidPlayerId.code(), "INVALID_PLAYER_ID");
        assert_eq!(GameError::PlayerNotFound.code(), "PLAYER_NOT_FOUND");
    }

    #[test]
    fn test_error_into_server_message() {
        let msg: ServerMessage = GameError::RoomNotFound("ABC123".into()).into();
        match msg {
            ServerMessage::Error { code, message } => {
                assert_eq!(code, "ROOM_NOT_FOUND");
                assert!(message.contains("ABC123"));
            }
            _ => panic!("Expected Error message"),
        }
    }
}
