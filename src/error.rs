//! Error types for the session coordinator.

use crate::games::bulls_cows::CodeError;
use crate::store::StoreError;
use derive_more::{Display, Error};

/// Category of a coordinator failure.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum CoordinatorErrorKind {
    /// Malformed secret or guess.
    #[display("{}", _0)]
    Validation(String),
    /// Unknown session id.
    #[display("Game '{}' not found", _0)]
    NotFound(String),
    /// The event is not allowed in the session's current state.
    #[display("{}", _0)]
    StateConflict(String),
    /// The store rejected a write.
    #[display("Storage failure: {}", _0)]
    Persistence(String),
}

/// Coordinator error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Coordinator error: {} at {}:{}", kind, file, line)]
pub struct CoordinatorError {
    /// What went wrong.
    pub kind: CoordinatorErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl CoordinatorError {
    /// Creates a new coordinator error with caller location tracking.
    #[track_caller]
    pub fn new(kind: CoordinatorErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for a [`CoordinatorErrorKind::Validation`] error.
    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CoordinatorErrorKind::Validation(message.into()))
    }

    /// Shorthand for a [`CoordinatorErrorKind::NotFound`] error.
    #[track_caller]
    pub fn not_found(session_id: impl Into<String>) -> Self {
        Self::new(CoordinatorErrorKind::NotFound(session_id.into()))
    }

    /// Shorthand for a [`CoordinatorErrorKind::StateConflict`] error.
    #[track_caller]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CoordinatorErrorKind::StateConflict(message.into()))
    }

    /// Message safe to show the player who triggered the error.
    ///
    /// Storage details stay in the logs.
    pub fn user_message(&self) -> String {
        match &self.kind {
            CoordinatorErrorKind::Persistence(_) => {
                "Your request could not be processed, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<CodeError> for CoordinatorError {
    #[track_caller]
    fn from(err: CodeError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<StoreError> for CoordinatorError {
    #[track_caller]
    fn from(err: StoreError) -> Self {
        Self::new(CoordinatorErrorKind::Persistence(err.message))
    }
}
