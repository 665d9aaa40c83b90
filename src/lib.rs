//! Strictly Bulls library - Bulls and Cows game server
//!
//! Players pick a three-digit secret and take turns guessing each other's.
//! Each guess is scored as exact matches (right digit, right place) and value
//! matches (right digit, wrong place).
//!
//! # Architecture
//!
//! - **Games**: the evaluator and validated codes
//! - **Session**: two-player session records and their transitions
//! - **Coordinator**: serialized per-session event handling and role-scoped fan-out
//! - **Store / Db**: session storage in memory or SQLite
//! - **Server**: axum WebSocket endpoint plus the single-player REST API
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use strictly_bulls::{ConnectionHub, Coordinator, MemorySessionStore};
//!
//! let hub = Arc::new(ConnectionHub::new());
//! let coordinator = Coordinator::new(Arc::new(MemorySessionStore::new()), hub.clone());
//!
//! let alice = "alice".into();
//! let _inbox = hub.register("alice".into());
//! let game_id = coordinator.create_game(&alice, "135").unwrap();
//! assert_eq!(game_id.as_str().len(), 6);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod coordinator;
mod db;
mod error;
mod games;
mod hub;
mod protocol;
mod server;
mod session;
mod snapshot;
mod solo;
mod store;

// Crate-level exports - Game logic
pub use games::bulls_cows::{
    CODE_LENGTH, Code, CodeError, Score, evaluate, generate_secret, score,
};

// Crate-level exports - Sessions
pub use session::{
    ConnectionId, GuessLog, GuessRecord, PlayerSlot, Role, Session, SessionId, SessionStatus,
};
pub use snapshot::{GuessLogs, SessionView};

// Crate-level exports - Coordination
pub use coordinator::{Coordinator, DEFAULT_SESSION_ID_ATTEMPTS, DEFAULT_SESSION_ID_LENGTH};
pub use error::{CoordinatorError, CoordinatorErrorKind};
pub use hub::{ConnectionHub, Outbox};
pub use protocol::{ClientEvent, ServerEvent};

// Crate-level exports - Storage
pub use db::{GameRepository, MIGRATIONS, NewSoloGame, SessionRow, SoloGame, run_migrations};
pub use store::{MemorySessionStore, SessionStore, StoreError};

// Crate-level exports - Services and server
pub use config::{ConfigError, DATABASE_URL_VAR, ServerConfig};
pub use server::{ApiError, AppState, GuessRequest, router};
pub use solo::{GuessOutcome, SoloError, SoloService};
