//! Error types for the session store and the engine built on top of it.

use shared::ErrorKind;
use thiserror::Error;

/// Failures raised by [`crate::store::SessionStore`] itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(String),
    #[error("record {0} already exists")]
    AlreadyExists(String),
}

/// Business errors returned by room and game operations.
///
/// Every variant is reported to the caller as a failed response; only
/// [`EngineError::Internal`] signals a bug rather than a bad request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("game for room {0} not found")]
    SessionNotFound(String),
    #[error("player {0} not in game or dead")]
    PlayerNotActive(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("room is full")]
    RoomFull,
    #[error("player {0} already in room")]
    AlreadyMember(String),
    #[error("not enough players to start game")]
    NotEnoughPlayers,
    #[error("invalid direction")]
    InvalidDirection,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::RoomNotFound(_)
            | EngineError::SessionNotFound(_)
            | EngineError::PlayerNotActive(_) => ErrorKind::NotFound,
            EngineError::InvalidState(_) | EngineError::NotEnoughPlayers => {
                ErrorKind::InvalidState
            }
            EngineError::RoomFull => ErrorKind::Capacity,
            EngineError::AlreadyMember(_) => ErrorKind::Conflict,
            EngineError::InvalidDirection | EngineError::InvalidInput(_) => {
                ErrorKind::InvalidInput
            }
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Re-labels a missing record as a missing game session. Game operations
    /// look sessions up by room id, so the store only knows about rooms.
    pub(crate) fn into_session_error(self) -> Self {
        match self {
            EngineError::RoomNotFound(id) => EngineError::SessionNotFound(id),
            other => other,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => EngineError::RoomNotFound(id),
            other => EngineError::Internal(other.to_string()),
        }
    }
}
