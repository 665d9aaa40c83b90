//! Single-player game business logic layer.

use derive_more::{Display, Error};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::db::GameRepository;
use crate::games::bulls_cows::{Code, Score, generate_secret, score};
use crate::store::StoreError;

/// Result of one single-player guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuessOutcome {
    /// The submitted guess.
    pub guess: Code,
    /// Score against the secret.
    pub result: Score,
    /// Attempts made so far, including this one.
    pub attempts: i32,
    /// Whether this guess won the game.
    pub is_won: bool,
    /// Human-readable summary.
    pub message: String,
}

/// Why a single-player request failed.
#[derive(Debug, Clone, Display, Error)]
pub enum SoloError {
    /// No game with that id.
    #[display("Game not found")]
    NotFound,
    /// The game was already won.
    #[display("Game is already won")]
    AlreadyWon,
    /// The request carried no guess.
    #[display("Missing guess")]
    MissingGuess,
    /// The guess is not three digits.
    #[display("Invalid guess format (must be 3 digits)")]
    InvalidGuess,
    /// The store failed.
    #[display("{}", _0)]
    Store(StoreError),
}

impl From<StoreError> for SoloError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Service layer for single-player games.
///
/// Wraps [`GameRepository`] with secret generation and scoring.
#[derive(Debug, Clone)]
pub struct SoloService {
    repository: GameRepository,
}

impl SoloService {
    /// Creates a new solo service backed by the given repository.
    #[instrument(skip(repository))]
    pub fn new(repository: GameRepository) -> Self {
        info!("Creating SoloService");
        Self { repository }
    }

    /// Starts a game with a fresh random secret and returns its id.
    #[instrument(skip(self))]
    pub fn start_game(&self) -> Result<i32, SoloError> {
        let game = self.repository.create_solo_game(&generate_secret())?;
        info!(game_id = game.id(), "Solo game started");
        Ok(*game.id())
    }

    /// Scores a guess for game `id`. Repeated digits are allowed.
    pub fn guess(&self, id: i32, raw_guess: &str) -> Result<GuessOutcome, SoloError> {
        self.submit(id, Some(&Value::String(raw_guess.to_string())))
    }

    /// Scores a guess taken from a request body.
    ///
    /// Checks run in order: the game exists, it is not won, a guess is
    /// present, and the guess is a string of three digits.
    #[instrument(skip(self, raw_guess))]
    pub fn submit(&self, id: i32, raw_guess: Option<&Value>) -> Result<GuessOutcome, SoloError> {
        let game = self.repository.get_solo_game(id)?.ok_or(SoloError::NotFound)?;

        if *game.is_won() {
            debug!("Guess on a finished game");
            return Err(SoloError::AlreadyWon);
        }

        let guess = raw_guess
            .ok_or(SoloError::MissingGuess)?
            .as_str()
            .and_then(|raw| Code::parse(raw).ok())
            .ok_or(SoloError::InvalidGuess)?;
        let secret = Code::parse(game.secret_number()).map_err(|e| {
            warn!(error = %e, "Stored secret is corrupt");
            SoloError::Store(StoreError::new(e.to_string()))
        })?;

        let result = score(&secret, &guess);
        let updated = self
            .repository
            .record_solo_attempt(id, result.is_win())?
            .ok_or(SoloError::AlreadyWon)?;

        let message = if result.is_win() {
            format!(
                "Congratulations! You got it in {} attempts!",
                updated.attempts()
            )
        } else {
            format!("Result: {}", result)
        };

        Ok(GuessOutcome {
            guess,
            result,
            attempts: *updated.attempts(),
            is_won: *updated.is_won(),
            message,
        })
    }
}
