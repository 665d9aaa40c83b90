//! Multiplayer session coordinator.
//!
//! Every event that changes a session runs as one unit under that session's
//! lock: reload the record, compute the next state, persist it, then emit
//! role-scoped views. Events for different sessions never share a lock.

use crate::error::{CoordinatorError, CoordinatorErrorKind};
use crate::games::bulls_cows::{Code, Score};
use crate::hub::Outbox;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::session::{ConnectionId, Session, SessionId, SessionStatus};
use crate::snapshot::SessionView;
use crate::store::SessionStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, instrument, warn};

/// Default length of generated session ids.
pub const DEFAULT_SESSION_ID_LENGTH: usize = 6;

/// Default number of attempts to find an unused session id.
pub const DEFAULT_SESSION_ID_ATTEMPTS: usize = 16;

/// Table of per-session locks.
#[derive(Debug, Default, Clone)]
struct SessionLocks {
    locks: Arc<Mutex<HashMap<SessionId, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    fn for_session(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id.clone()).or_default().clone()
    }

    /// Forgets the lock of a session that can no longer change.
    ///
    /// Finished and abandoned sessions reject every transition, so a caller
    /// still holding the old lock and one taking a fresh lock both reload a
    /// terminal record and make no write.
    fn release(&self, id: &SessionId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Coordinates create, join, guess and disconnect events.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn SessionStore>,
    outbox: Arc<dyn Outbox>,
    locks: SessionLocks,
    id_length: usize,
    id_attempts: usize,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("id_length", &self.id_length)
            .field("id_attempts", &self.id_attempts)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Creates a coordinator over a store and an outbox.
    #[instrument(skip_all)]
    pub fn new(store: Arc<dyn SessionStore>, outbox: Arc<dyn Outbox>) -> Self {
        info!("Creating session coordinator");
        Self {
            store,
            outbox,
            locks: SessionLocks::default(),
            id_length: DEFAULT_SESSION_ID_LENGTH,
            id_attempts: DEFAULT_SESSION_ID_ATTEMPTS,
        }
    }

    /// Overrides how session ids are generated.
    pub fn with_id_policy(mut self, length: usize, attempts: usize) -> Self {
        self.id_length = length.max(1);
        self.id_attempts = attempts.max(1);
        self
    }

    /// Handles one inbound event, reporting any rejection to the sender only.
    #[instrument(skip(self, event), fields(connection_id = %connection))]
    pub fn handle(&self, connection: &ConnectionId, event: ClientEvent) {
        let outcome = match event {
            ClientEvent::CreateGame { secret } => {
                self.create_game(connection, &secret).map(|_| ())
            }
            ClientEvent::JoinGame { game_id, secret } => {
                self.join_game(connection, &game_id, &secret)
            }
            ClientEvent::MakeGuess { guess } => self.submit_guess(connection, &guess).map(|_| ()),
        };

        if let Err(e) = outcome {
            match &e.kind {
                CoordinatorErrorKind::Persistence(_) => error!(error = %e, "Event failed"),
                _ => debug!(error = %e, "Event rejected"),
            }
            self.outbox
                .send(connection, ServerEvent::error(e.user_message()));
        }
    }

    /// Opens a waiting session with `connection` in slot 1.
    ///
    /// # Errors
    ///
    /// Rejects malformed secrets and connections already in an open session.
    #[instrument(skip(self, secret), fields(connection_id = %connection))]
    pub fn create_game(
        &self,
        connection: &ConnectionId,
        secret: &str,
    ) -> Result<SessionId, CoordinatorError> {
        let secret = Code::parse_distinct(secret)?;
        self.ensure_not_playing(connection)?;

        for attempt in 0..self.id_attempts {
            let id = SessionId::generate(self.id_length);
            if self.store.get(&id)?.is_some() {
                debug!(attempt, session_id = %id, "Session id taken, retrying");
                continue;
            }

            let lock = self.locks.for_session(&id);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            if self.store.get(&id)?.is_some() {
                debug!(attempt, session_id = %id, "Session id claimed concurrently, retrying");
                continue;
            }

            let session = Session::create(id.clone(), connection.clone(), secret);
            self.store.insert(&session)?;
            self.outbox.send(
                connection,
                ServerEvent::GameCreated {
                    game_id: id.clone(),
                },
            );
            info!(session_id = %id, "Game created");
            return Ok(id);
        }

        warn!(attempts = self.id_attempts, "No free session id");
        Err(CoordinatorError::new(CoordinatorErrorKind::Persistence(
            "could not allocate a session id".to_string(),
        )))
    }

    /// Fills slot 2 of a waiting session and starts the game.
    ///
    /// # Errors
    ///
    /// Rejects malformed secrets, unknown ids, sessions that are not waiting,
    /// joining one's own session, and connections already in another game.
    #[instrument(skip(self, secret), fields(connection_id = %connection))]
    pub fn join_game(
        &self,
        connection: &ConnectionId,
        game_id: &str,
        secret: &str,
    ) -> Result<(), CoordinatorError> {
        let secret = Code::parse_distinct(secret)?;
        let id = SessionId::from(game_id.trim().to_ascii_uppercase());
        if self.store.get(&id)?.is_none() {
            return Err(CoordinatorError::not_found(id.as_str()));
        }

        let lock = self.locks.for_session(&id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let session = self
            .store
            .get(&id)?
            .ok_or_else(|| CoordinatorError::not_found(id.as_str()))?;
        let next = session.joined(connection, secret)?;
        self.ensure_not_playing(connection)?;

        self.store.update(&next)?;
        self.send_views(&next);
        info!(session_id = %id, "Game started");
        Ok(())
    }

    /// Scores a guess from the player whose turn it is.
    ///
    /// # Errors
    ///
    /// Rejects malformed guesses, connections without an active session, and
    /// guesses out of turn.
    #[instrument(skip(self, guess), fields(connection_id = %connection))]
    pub fn submit_guess(
        &self,
        connection: &ConnectionId,
        guess: &str,
    ) -> Result<Score, CoordinatorError> {
        let guess = Code::parse_distinct(guess)?;

        let id = self
            .store
            .find_open_by_connection(connection)?
            .map(|s| s.id().clone())
            .ok_or_else(|| CoordinatorError::conflict("You are not in an active game"))?;

        let lock = self.locks.for_session(&id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let session = self
            .store
            .get(&id)?
            .ok_or_else(|| CoordinatorError::not_found(id.as_str()))?;
        let (next, result) = session.with_guess(connection, guess)?;

        self.store.update(&next)?;
        if !next.status().is_open() {
            self.locks.release(&id);
        }
        self.send_views(&next);
        info!(session_id = %id, %result, status = %next.status(), "Guess scored");
        Ok(result)
    }

    /// Abandons the open session `connection` belonged to, if any.
    ///
    /// A disconnect from an active game notifies the remaining player once. A
    /// creator leaving a waiting session abandons it silently. Anything else
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the abandoned state could not be saved.
    #[instrument(skip(self), fields(connection_id = %connection))]
    pub fn disconnect(&self, connection: &ConnectionId) -> Result<(), CoordinatorError> {
        let Some(open) = self.store.find_open_by_connection(connection)? else {
            debug!("Disconnected without an open game");
            return Ok(());
        };
        let id = open.id().clone();

        let lock = self.locks.for_session(&id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(session) = self.store.get(&id)? else {
            return Ok(());
        };
        let Some(next) = session.abandoned_by(connection) else {
            return Ok(());
        };

        self.store.update(&next)?;
        self.locks.release(&id);

        if *session.status() == SessionStatus::Active {
            for remaining in next.participants().filter(|c| *c != connection) {
                self.outbox.send(
                    remaining,
                    ServerEvent::GameUpdate(SessionView::for_recipient(&next, remaining)),
                );
                self.outbox.send(
                    remaining,
                    ServerEvent::OpponentLeft {
                        game_id: id.clone(),
                        message: "Your opponent left the game".to_string(),
                    },
                );
            }
        }
        info!(session_id = %id, "Game abandoned after disconnect");
        Ok(())
    }

    /// Sends each participant its own view of `session`.
    fn send_views(&self, session: &Session) {
        for participant in session.participants() {
            self.outbox.send(
                participant,
                ServerEvent::GameUpdate(SessionView::for_recipient(session, participant)),
            );
        }
    }

    fn ensure_not_playing(&self, connection: &ConnectionId) -> Result<(), CoordinatorError> {
        match self.store.find_open_by_connection(connection)? {
            Some(session) => {
                debug!(session_id = %session.id(), "Connection already in an open game");
                Err(CoordinatorError::conflict("You are already in a game"))
            }
            None => Ok(()),
        }
    }
}
