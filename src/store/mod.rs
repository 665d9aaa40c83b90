//! Session record storage.
//!
//! A store keeps session records by id plus an index from connection handle
//! to the open session that handle belongs to. Both are updated together on
//! every write.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemorySessionStore;

use crate::session::{ConnectionId, Session, SessionId};

/// Key-value store of session records.
pub trait SessionStore: Send + Sync {
    /// Loads a session by id.
    fn get(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    /// Finds the waiting or active session `connection` takes part in.
    fn find_open_by_connection(
        &self,
        connection: &ConnectionId,
    ) -> Result<Option<Session>, StoreError>;

    /// Stores a new session. Fails if the id is already taken.
    fn insert(&self, session: &Session) -> Result<(), StoreError>;

    /// Replaces an existing session. Fails if the id is unknown.
    fn update(&self, session: &Session) -> Result<(), StoreError>;
}
