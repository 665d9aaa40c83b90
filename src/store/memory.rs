//! In-process session store.

use super::{SessionStore, StoreError};
use crate::session::{ConnectionId, Session, SessionId};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<SessionId, Session>,
    by_connection: HashMap<ConnectionId, SessionId>,
}

impl Tables {
    fn index(&mut self, session: &Session) {
        for connection in session.participants() {
            self.by_connection
                .insert(connection.clone(), session.id().clone());
        }
    }
}

/// Session store backed by hash maps behind a single mutex.
///
/// The connection index always points at the most recent session a handle
/// joined; entries for finished or abandoned sessions are left in place and
/// filtered out on lookup.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    tables: Mutex<Tables>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions
            .len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    #[instrument(skip(self))]
    fn get(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.sessions.get(id).cloned())
    }

    #[instrument(skip(self))]
    fn find_open_by_connection(
        &self,
        connection: &ConnectionId,
    ) -> Result<Option<Session>, StoreError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let session = tables
            .by_connection
            .get(connection)
            .and_then(|id| tables.sessions.get(id))
            .filter(|s| s.status().is_open())
            .cloned();
        Ok(session)
    }

    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    fn insert(&self, session: &Session) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if tables.sessions.contains_key(session.id()) {
            return Err(StoreError::new(format!(
                "Session '{}' already exists",
                session.id()
            )));
        }
        tables.index(session);
        tables
            .sessions
            .insert(session.id().clone(), session.clone());
        debug!("Session inserted");
        Ok(())
    }

    #[instrument(skip(self, session), fields(session_id = %session.id(), status = %session.status()))]
    fn update(&self, session: &Session) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if !tables.sessions.contains_key(session.id()) {
            return Err(StoreError::new(format!(
                "Session '{}' does not exist",
                session.id()
            )));
        }
        tables.index(session);
        tables
            .sessions
            .insert(session.id().clone(), session.clone());
        debug!("Session updated");
        Ok(())
    }
}
