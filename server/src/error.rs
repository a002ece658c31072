//! Error taxonomy for the game session engine and its collaborators.
//!
//! The deliberate no-op branches of the engine (wrong phase, drawer guessing,
//! duplicate or wrong guesses, stale timers) are *not* errors; they come back
//! as outcome flags. Everything here is a genuine failure of the requested
//! action.

use shared::RoomId;
use thiserror::Error;

/// Which entity a `NotFound` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundKind {
    Session(RoomId),
    Room(RoomId),
    Category(String),
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotFoundKind::Session(room) => write!(f, "game session for room {room}"),
            NotFoundKind::Room(room) => write!(f, "room {room}"),
            NotFoundKind::Category(category) => write!(f, "words for category {category}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("not found: {0}")]
    NotFound(NotFoundKind),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("a game needs at least {required} players, got {actual}")]
    InsufficientPlayers { required: usize, actual: usize },

    /// Transient failure of a collaborator (word source, store). Never
    /// retried inside the engine.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl GameError {
    pub fn session_not_found(room_id: &str) -> Self {
        Self::NotFound(NotFoundKind::Session(room_id.to_string()))
    }

    pub fn room_not_found(room_id: &str) -> Self {
        Self::NotFound(NotFoundKind::Room(room_id.to_string()))
    }

    pub fn invalid_state(detail: impl Into<String>) -> Self {
        Self::InvalidState(detail.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GameError::NotFound(_))
    }
}

pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            GameError::session_not_found("ABC123").to_string(),
            "not found: game session for room ABC123"
        );
        assert_eq!(
            GameError::InsufficientPlayers {
                required: 2,
                actual: 1
            }
            .to_string(),
            "a game needs at least 2 players, got 1"
        );
        assert_eq!(
            GameError::NotFound(NotFoundKind::Category("animals".to_string())).to_string(),
            "not found: words for category animals"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(GameError::room_not_found("R1").is_not_found());
        assert!(!GameError::invalid_state("lobby").is_not_found());
        assert!(!GameError::Unavailable("store".to_string()).is_not_found());
    }
}
