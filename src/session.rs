//! Multiplayer session records and their state transitions.
//!
//! Transitions never mutate a session in place. Each one returns a new
//! [`Session`] value so the coordinator can persist it and, if the write
//! fails, simply drop it.

use crate::error::CoordinatorError;
use crate::games::bulls_cows::{Code, Score, score};
use chrono::{NaiveDateTime, Utc};
use derive_getters::Getters;
use derive_more::{Display, From};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Characters used for shareable session ids (no 0/O or 1/I look-alikes).
const SESSION_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated connection handles.
const CONNECTION_ID_LENGTH: usize = 20;

/// Short, human-shareable session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a random id of the given length.
    pub fn generate(length: usize) -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..length)
            .map(|_| {
                let i = rng.gen_range(0..SESSION_ID_ALPHABET.len());
                char::from(SESSION_ID_ALPHABET[i])
            })
            .collect();
        Self(id)
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Opaque per-connection handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generates a fresh random handle.
    pub fn generate() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CONNECTION_ID_LENGTH)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Returns the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Lifecycle state of a session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    /// Slot 2 is empty.
    Waiting,
    /// Both slots filled, game in progress.
    Active,
    /// A player guessed the opponent's secret.
    Finished,
    /// A participant disconnected before the end.
    Abandoned,
}

impl SessionStatus {
    /// Whether the session still holds its participants (waiting or active).
    pub fn is_open(self) -> bool {
        matches!(self, Self::Waiting | Self::Active)
    }
}

/// Which of the two fixed slots a participant occupies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// The creator.
    Player1,
    /// The joiner.
    Player2,
}

impl Role {
    /// Returns the other slot.
    pub fn opponent(self) -> Self {
        match self {
            Role::Player1 => Role::Player2,
            Role::Player2 => Role::Player1,
        }
    }
}

/// A submitted guess and its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessRecord {
    /// The guessed code.
    pub guess: Code,
    /// Score against the opponent's secret.
    pub result: Score,
}

/// Append-only sequence of guesses for one slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuessLog(Vec<GuessRecord>);

impl GuessLog {
    /// Returns a new log with `record` appended, leaving `self` untouched.
    pub fn appended(&self, record: GuessRecord) -> Self {
        Self(self.0.iter().copied().chain(std::iter::once(record)).collect())
    }

    /// Returns the recorded guesses in submission order.
    pub fn records(&self) -> &[GuessRecord] {
        &self.0
    }

    /// Number of guesses recorded.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no guesses have been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<GuessRecord>> for GuessLog {
    fn from(records: Vec<GuessRecord>) -> Self {
        Self(records)
    }
}

/// A filled player slot.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct PlayerSlot {
    /// Connection occupying the slot.
    connection: ConnectionId,
    /// The player's hidden secret.
    secret: Code,
    /// Guesses this player has submitted.
    guesses: GuessLog,
}

impl PlayerSlot {
    /// Creates a slot with an empty guess log.
    pub fn new(connection: ConnectionId, secret: Code) -> Self {
        Self {
            connection,
            secret,
            guesses: GuessLog::default(),
        }
    }

    /// Rebuilds a slot from stored parts.
    pub fn restore(connection: ConnectionId, secret: Code, guesses: GuessLog) -> Self {
        Self {
            connection,
            secret,
            guesses,
        }
    }
}

/// A two-player match.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Session {
    /// Session id.
    id: SessionId,
    /// The creator's slot.
    player1: PlayerSlot,
    /// The joiner's slot, empty while waiting.
    player2: Option<PlayerSlot>,
    /// Connection allowed to guess next.
    current_turn: Option<ConnectionId>,
    /// Lifecycle state.
    status: SessionStatus,
    /// Winner's connection, set only when finished.
    winner: Option<ConnectionId>,
    /// Creation time (UTC).
    created_at: NaiveDateTime,
}

impl Session {
    /// Creates a waiting session with the requester in slot 1.
    #[instrument(skip(secret), fields(session_id = %id, connection_id = %creator))]
    pub fn create(id: SessionId, creator: ConnectionId, secret: Code) -> Self {
        info!("Creating new game session");
        Self {
            id,
            player1: PlayerSlot::new(creator, secret),
            player2: None,
            current_turn: None,
            status: SessionStatus::Waiting,
            winner: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    /// Rebuilds a session from stored parts without re-running transitions.
    pub fn restore(
        id: SessionId,
        player1: PlayerSlot,
        player2: Option<PlayerSlot>,
        current_turn: Option<ConnectionId>,
        status: SessionStatus,
        winner: Option<ConnectionId>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            player1,
            player2,
            current_turn,
            status,
            winner,
            created_at,
        }
    }

    /// Returns the slot for a role, if filled.
    pub fn slot(&self, role: Role) -> Option<&PlayerSlot> {
        match role {
            Role::Player1 => Some(&self.player1),
            Role::Player2 => self.player2.as_ref(),
        }
    }

    /// Returns the role a connection occupies in this session.
    pub fn role_of(&self, connection: &ConnectionId) -> Option<Role> {
        if &self.player1.connection == connection {
            Some(Role::Player1)
        } else if self.player2.as_ref().map(|p| &p.connection) == Some(connection) {
            Some(Role::Player2)
        } else {
            None
        }
    }

    /// Connections of all filled slots.
    pub fn participants(&self) -> impl Iterator<Item = &ConnectionId> {
        std::iter::once(&self.player1.connection)
            .chain(self.player2.as_ref().map(|p| &p.connection))
    }

    /// Fills slot 2 and starts the game with slot 1 to move.
    ///
    /// # Errors
    ///
    /// Returns a state conflict if the session is not waiting or the joiner
    /// already holds slot 1.
    #[instrument(skip(self, secret), fields(session_id = %self.id, status = %self.status))]
    pub fn joined(&self, joiner: &ConnectionId, secret: Code) -> Result<Self, CoordinatorError> {
        if self.player1.connection == *joiner {
            warn!(connection_id = %joiner, "Creator tried to join own game");
            return Err(CoordinatorError::conflict("You cannot join your own game"));
        }

        match self.status {
            SessionStatus::Waiting => {}
            SessionStatus::Active => {
                return Err(CoordinatorError::conflict("This game already has two players"));
            }
            SessionStatus::Finished | SessionStatus::Abandoned => {
                return Err(CoordinatorError::conflict("This game is no longer available"));
            }
        }

        let mut next = self.clone();
        next.player2 = Some(PlayerSlot::new(joiner.clone(), secret));
        next.status = SessionStatus::Active;
        next.current_turn = Some(self.player1.connection.clone());

        info!(connection_id = %joiner, "Player joined, game is active");
        Ok(next)
    }

    /// Records a guess from the player whose turn it is.
    ///
    /// Scores the guess against the opponent's secret, appends it to the
    /// guesser's log, and either finishes the game or hands the turn over.
    ///
    /// # Errors
    ///
    /// Returns a state conflict if the session is not active, the guesser is
    /// not a participant, or it is not their turn.
    #[instrument(skip(self, guess), fields(session_id = %self.id, status = %self.status))]
    pub fn with_guess(
        &self,
        guesser: &ConnectionId,
        guess: Code,
    ) -> Result<(Self, Score), CoordinatorError> {
        let role = self
            .role_of(guesser)
            .ok_or_else(|| CoordinatorError::conflict("You are not a player in this game"))?;

        match self.status {
            SessionStatus::Active => {}
            SessionStatus::Waiting => {
                return Err(CoordinatorError::conflict("Waiting for an opponent to join"));
            }
            SessionStatus::Finished | SessionStatus::Abandoned => {
                return Err(CoordinatorError::conflict("This game is over"));
            }
        }

        if self.current_turn.as_ref() != Some(guesser) {
            warn!(connection_id = %guesser, "Guess submitted out of turn");
            return Err(CoordinatorError::conflict("It is not your turn"));
        }

        let opponent = self
            .slot(role.opponent())
            .ok_or_else(|| CoordinatorError::conflict("Waiting for an opponent to join"))?;
        let result = score(opponent.secret(), &guess);
        let opponent_connection = opponent.connection.clone();

        let mut next = self.clone();
        let record = GuessRecord { guess, result };
        match role {
            Role::Player1 => next.player1.guesses = self.player1.guesses.appended(record),
            Role::Player2 => {
                if let Some(slot) = next.player2.as_mut() {
                    slot.guesses = slot.guesses.appended(record);
                }
            }
        }

        if result.is_win() {
            next.status = SessionStatus::Finished;
            next.winner = Some(guesser.clone());
            next.current_turn = None;
            info!(connection_id = %guesser, "Secret cracked, game finished");
        } else {
            next.current_turn = Some(opponent_connection);
            debug!(connection_id = %guesser, %result, "Guess recorded, turn passes");
        }

        Ok((next, result))
    }

    /// Abandons the session because `leaver` disconnected.
    ///
    /// Returns `None` when the disconnect changes nothing: the leaver is not a
    /// participant, the game already ended, or a joiner-less session is left by
    /// someone other than its creator.
    #[instrument(skip(self), fields(session_id = %self.id, status = %self.status))]
    pub fn abandoned_by(&self, leaver: &ConnectionId) -> Option<Self> {
        let role = self.role_of(leaver)?;
        let applies = match self.status {
            SessionStatus::Active => true,
            SessionStatus::Waiting => role == Role::Player1,
            SessionStatus::Finished | SessionStatus::Abandoned => false,
        };
        if !applies {
            debug!("Disconnect has no effect on this session");
            return None;
        }

        let mut next = self.clone();
        next.status = SessionStatus::Abandoned;
        next.current_turn = None;
        info!(connection_id = %leaver, "Session abandoned");
        Some(next)
    }
}
