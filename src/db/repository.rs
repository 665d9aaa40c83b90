//! SQLite repository for multiplayer sessions and single-player games.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::db::{NewSoloGame, SessionRow, SoloGame, schema};
use crate::games::bulls_cows::Code;
use crate::session::{ConnectionId, Session, SessionId, SessionStatus};
use crate::store::{SessionStore, StoreError};

/// Milliseconds SQLite waits on a locked database before giving up.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Database repository for game records.
///
/// Opens a fresh connection per call, so it is cheap to clone and safe to
/// share across threads.
#[derive(Debug, Clone)]
pub struct GameRepository {
    db_path: String,
}

impl GameRepository {
    /// Creates a new repository for the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the path is empty.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, StoreError> {
        if db_path.trim().is_empty() {
            return Err(StoreError::new("Database path is empty"));
        }
        info!(path = %db_path, "Creating GameRepository");
        Ok(Self { db_path })
    }

    /// Returns the database path.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, StoreError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path).map_err(|e| {
            StoreError::new(format!("Failed to connect to '{}': {}", self.db_path, e))
        })?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS))?;
        Ok(conn)
    }

    /// Starts a single-player game with the given secret.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a database error occurs.
    #[instrument(skip(self, secret))]
    pub fn create_solo_game(&self, secret: &Code) -> Result<SoloGame, StoreError> {
        debug!("Creating solo game");
        let mut conn = self.connection()?;

        let game = diesel::insert_into(schema::solo_games::table)
            .values(&NewSoloGame::new(secret.to_string()))
            .returning(SoloGame::as_returning())
            .get_result(&mut conn)?;

        info!(game_id = game.id(), "Solo game created");
        Ok(game)
    }

    /// Gets a single-player game by id. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_solo_game(&self, id: i32) -> Result<Option<SoloGame>, StoreError> {
        let mut conn = self.connection()?;

        let game = schema::solo_games::table
            .find(id)
            .select(SoloGame::as_select())
            .first(&mut conn)
            .optional()?;

        if game.is_none() {
            debug!("Solo game not found");
        }
        Ok(game)
    }

    /// Counts one more attempt on a game that is still open.
    ///
    /// A won game is never reopened: returns `None` if the game does not
    /// exist or was already won.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn record_solo_attempt(
        &self,
        id: i32,
        won: bool,
    ) -> Result<Option<SoloGame>, StoreError> {
        let mut conn = self.connection()?;
        use schema::solo_games::dsl;

        let game = diesel::update(dsl::solo_games.find(id).filter(dsl::is_won.eq(false)))
            .set((dsl::attempts.eq(dsl::attempts + 1), dsl::is_won.eq(won)))
            .returning(SoloGame::as_returning())
            .get_result(&mut conn)
            .optional()?;

        match &game {
            Some(game) => {
                info!(game_id = id, attempts = game.attempts(), won, "Solo attempt recorded")
            }
            None => debug!(game_id = id, "No open solo game to record against"),
        }
        Ok(game)
    }
}

impl SessionStore for GameRepository {
    #[instrument(skip(self))]
    fn get(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let mut conn = self.connection()?;
        let row = schema::sessions::table
            .find(id.as_str())
            .select(SessionRow::as_select())
            .first(&mut conn)
            .optional()?;
        row.map(SessionRow::into_session).transpose()
    }

    #[instrument(skip(self))]
    fn find_open_by_connection(
        &self,
        connection: &ConnectionId,
    ) -> Result<Option<Session>, StoreError> {
        use schema::sessions::dsl;

        let open: Vec<&'static str> = vec![
            SessionStatus::Waiting.into(),
            SessionStatus::Active.into(),
        ];
        let mut conn = self.connection()?;

        let as_creator = dsl::sessions
            .filter(dsl::player1_conn.eq(connection.as_str()))
            .filter(dsl::status.eq_any(open.clone()))
            .order(dsl::created_at.desc())
            .select(SessionRow::as_select())
            .first(&mut conn)
            .optional()?;

        let as_joiner = dsl::sessions
            .filter(dsl::player2_conn.eq(connection.as_str()))
            .filter(dsl::status.eq_any(open))
            .order(dsl::created_at.desc())
            .select(SessionRow::as_select())
            .first(&mut conn)
            .optional()?;

        let latest = match (as_creator, as_joiner) {
            (Some(a), Some(b)) => {
                warn!(first = %a.id, second = %b.id, "Connection appears in two open sessions");
                Some(if a.created_at >= b.created_at { a } else { b })
            }
            (a, b) => a.or(b),
        };
        latest.map(SessionRow::into_session).transpose()
    }

    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    fn insert(&self, session: &Session) -> Result<(), StoreError> {
        let row = SessionRow::from_session(session)?;
        let mut conn = self.connection()?;

        diesel::insert_into(schema::sessions::table)
            .values(&row)
            .execute(&mut conn)?;

        debug!("Session inserted");
        Ok(())
    }

    #[instrument(skip(self, session), fields(session_id = %session.id(), status = %session.status()))]
    fn update(&self, session: &Session) -> Result<(), StoreError> {
        let row = SessionRow::from_session(session)?;
        let mut conn = self.connection()?;

        conn.transaction::<_, StoreError, _>(|conn| {
            let changed = diesel::update(schema::sessions::table.find(row.id.as_str()))
                .set(&row)
                .execute(conn)?;
            if changed != 1 {
                return Err(StoreError::new(format!(
                    "Session '{}' does not exist",
                    row.id
                )));
            }
            Ok(())
        })?;

        debug!("Session updated");
        Ok(())
    }
}
