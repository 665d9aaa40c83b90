//! Per-recipient views of a session.

use crate::games::bulls_cows::Code;
use crate::session::{ConnectionId, GuessLog, Role, Session, SessionId, SessionStatus};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Both players' guess logs, keyed by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessLogs {
    /// Guesses made by the creator.
    pub player1: GuessLog,
    /// Guesses made by the joiner.
    pub player2: GuessLog,
}

/// Session state as seen by one participant.
///
/// The opponent's secret is present only once the session is finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    /// Session id.
    #[serde(rename = "game_id")]
    pub session_id: SessionId,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// The recipient's slot, if they are a participant.
    #[serde(rename = "your_player_id")]
    pub your_role: Option<Role>,
    /// Connection allowed to guess next.
    #[serde(rename = "current_turn_sid")]
    pub current_turn: Option<ConnectionId>,
    /// Winning connection.
    #[serde(rename = "winner_sid")]
    pub winner: Option<ConnectionId>,
    /// Both players' guesses.
    pub guesses: GuessLogs,
    /// Revealed after the game finishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_secret: Option<Code>,
}

impl SessionView {
    /// Builds the view for `recipient`.
    #[instrument(skip(session), fields(session_id = %session.id(), status = %session.status()))]
    pub fn for_recipient(session: &Session, recipient: &ConnectionId) -> Self {
        let your_role = session.role_of(recipient);

        let opponent_secret = match (session.status(), your_role) {
            (SessionStatus::Finished, Some(role)) => {
                session.slot(role.opponent()).map(|slot| *slot.secret())
            }
            _ => None,
        };

        Self {
            session_id: session.id().clone(),
            status: *session.status(),
            your_role,
            current_turn: session.current_turn().clone(),
            winner: session.winner().clone(),
            guesses: GuessLogs {
                player1: session.player1().guesses().clone(),
                player2: session
                    .player2()
                    .as_ref()
                    .map(|slot| slot.guesses().clone())
                    .unwrap_or_default(),
            },
            opponent_secret,
        }
    }
}
