//! Errors raised by the match and hub layers.
//!
//! Board-level failures (`FenError`, `MoveParseError`) live in
//! [`crate::board`]; they are wrapped here when they stop match creation.

use uuid::Uuid;

use crate::board::FenError;

/// Failures while building a match.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("invalid players: {reason}")]
    InvalidPlayers { reason: String },

    #[error("invalid time control: {reason}")]
    InvalidTimeControl { reason: String },

    #[error("invalid starting position")]
    InvalidPosition(#[from] FenError),
}

/// Failures reported by an external collaborator (store, presence, broker).
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{operation} failed: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },

    #[error("profile not found for user {user_id}")]
    ProfileNotFound { user_id: Uuid },
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("malformed broker topic: {topic}")]
    MalformedTopic { topic: String },

    #[error("malformed payload on {topic}")]
    MalformedPayload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("match setup failed")]
    Game(#[from] GameError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("hub is shutting down")]
    ShuttingDown,

    #[error("{task} task stopped: {reason}")]
    TaskFailed { task: &'static str, reason: String },

    #[error("{task} gave up after {attempts} restarts")]
    RestartsExhausted { task: &'static str, attempts: u32 },
}

impl HubError {
    /// Whether a fresh run of the failed task may succeed.
    #[must_use]
    pub fn is_restartable(&self) -> bool {
        matches!(self, HubError::TaskFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = GameError::InvalidPlayers {
            reason: "players must be distinct".into(),
        };
        assert_eq!(err.to_string(), "invalid players: players must be distinct");

        let err = CollaboratorError::Unavailable {
            operation: "persist_result",
            reason: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "persist_result failed: connection reset");

        let err = HubError::MalformedTopic {
            topic: "wsc.bad".into(),
        };
        assert_eq!(err.to_string(), "malformed broker topic: wsc.bad");

        let err = HubError::TaskFailed {
            task: "fan-out",
            reason: "panicked: boom".into(),
        };
        assert_eq!(err.to_string(), "fan-out task stopped: panicked: boom");
        assert!(err.is_restartable());
        assert!(!HubError::ShuttingDown.is_restartable());
    }

    #[test]
    fn test_fen_errors_convert_into_game_errors() {
        let err: GameError = FenError::WrongFieldCount { found: 1 }.into();
        assert!(matches!(err, GameError::InvalidPosition(_)));
        let err: HubError = err.into();
        assert!(matches!(err, HubError::Game(_)));
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GameError>();
        assert_send_sync::<CollaboratorError>();
        assert_send_sync::<HubError>();
    }
}
