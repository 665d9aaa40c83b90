//! Wire messages exchanged over the game WebSocket.
//!
//! Frames are JSON objects of the form `{"event": "...", "data": {...}}`.

use crate::session::{ConnectionId, SessionId};
use crate::snapshot::SessionView;
use serde::{Deserialize, Serialize};

/// Messages sent by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Open a new session with the creator's secret.
    CreateGame {
        /// Creator's secret.
        secret: String,
    },
    /// Take the empty slot of an existing session.
    JoinGame {
        /// Shared session id.
        game_id: String,
        /// Joiner's secret.
        secret: String,
    },
    /// Guess the opponent's secret.
    MakeGuess {
        /// The guess.
        guess: String,
    },
}

/// Messages sent to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Handshake: tells the client its own handle.
    Connected {
        /// The recipient's connection handle.
        connection_id: ConnectionId,
    },
    /// A session was created for the recipient.
    GameCreated {
        /// Id to share with the opponent.
        game_id: SessionId,
    },
    /// Role-scoped session state.
    GameUpdate(SessionView),
    /// The recipient's request was rejected.
    GameError {
        /// Human-readable reason.
        message: String,
    },
    /// The opponent disconnected and the session was abandoned.
    OpponentLeft {
        /// The abandoned session.
        game_id: SessionId,
        /// Human-readable notice.
        message: String,
    },
}

impl ServerEvent {
    /// Builds an error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self::GameError {
            message: message.into(),
        }
    }
}
