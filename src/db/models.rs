//! Database models and their mapping to domain types.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use tracing::instrument;

use crate::db::schema;
use crate::games::bulls_cows::Code;
use crate::session::{ConnectionId, GuessLog, PlayerSlot, Session, SessionStatus};
use crate::store::StoreError;

/// Multiplayer session row. Guess logs are stored as JSON arrays.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = schema::sessions)]
#[diesel(treat_none_as_null = true)]
pub struct SessionRow {
    /// Session id.
    pub id: String,
    /// Lifecycle state name.
    pub status: String,
    /// Creator's connection handle.
    pub player1_conn: String,
    /// Creator's secret.
    pub player1_secret: String,
    /// Creator's guesses as JSON.
    pub player1_guesses: String,
    /// Joiner's connection handle.
    pub player2_conn: Option<String>,
    /// Joiner's secret.
    pub player2_secret: Option<String>,
    /// Joiner's guesses as JSON.
    pub player2_guesses: String,
    /// Handle allowed to guess next.
    pub current_turn: Option<String>,
    /// Winning handle.
    pub winner: Option<String>,
    /// Creation time (UTC).
    pub created_at: NaiveDateTime,
}

impl SessionRow {
    /// Flattens a session into a row.
    #[instrument(skip(session), fields(session_id = %session.id()))]
    pub fn from_session(session: &Session) -> Result<Self, StoreError> {
        let player2 = session.player2().as_ref();
        Ok(Self {
            id: session.id().to_string(),
            status: session.status().to_string(),
            player1_conn: session.player1().connection().to_string(),
            player1_secret: session.player1().secret().to_string(),
            player1_guesses: serde_json::to_string(session.player1().guesses())?,
            player2_conn: player2.map(|p| p.connection().to_string()),
            player2_secret: player2.map(|p| p.secret().to_string()),
            player2_guesses: match player2 {
                Some(p) => serde_json::to_string(p.guesses())?,
                None => "[]".to_string(),
            },
            current_turn: session.current_turn().as_ref().map(ToString::to_string),
            winner: session.winner().as_ref().map(ToString::to_string),
            created_at: *session.created_at(),
        })
    }

    /// Rebuilds the domain session from a row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a stored value no longer parses.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn into_session(self) -> Result<Session, StoreError> {
        let status = self
            .status
            .parse::<SessionStatus>()
            .map_err(|_| StoreError::new(format!("Invalid status: '{}'", self.status)))?;

        let player1 = PlayerSlot::restore(
            ConnectionId::from(self.player1_conn),
            parse_secret(&self.player1_secret)?,
            serde_json::from_str::<GuessLog>(&self.player1_guesses)?,
        );

        let player2 = match (self.player2_conn, self.player2_secret) {
            (Some(conn), Some(secret)) => Some(PlayerSlot::restore(
                ConnectionId::from(conn),
                parse_secret(&secret)?,
                serde_json::from_str::<GuessLog>(&self.player2_guesses)?,
            )),
            (None, None) => None,
            _ => {
                return Err(StoreError::new(format!(
                    "Session '{}' has a half-filled second slot",
                    self.id
                )));
            }
        };

        Ok(Session::restore(
            self.id.into(),
            player1,
            player2,
            self.current_turn.map(ConnectionId::from),
            status,
            self.winner.map(ConnectionId::from),
            self.created_at,
        ))
    }
}

fn parse_secret(raw: &str) -> Result<Code, StoreError> {
    Code::parse_distinct(raw).map_err(|e| StoreError::new(e.to_string()))
}

/// Single-player game database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::solo_games)]
pub struct SoloGame {
    id: i32,
    secret_number: String,
    attempts: i32,
    is_won: bool,
    created_at: NaiveDateTime,
}

/// Insertable model for starting a single-player game.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::solo_games)]
pub struct NewSoloGame {
    secret_number: String,
}
