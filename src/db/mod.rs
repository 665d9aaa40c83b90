//! SQLite persistence for game sessions and single-player games.

mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use models::{NewSoloGame, SessionRow, SoloGame};
pub use repository::GameRepository;

use diesel::{Connection, SqliteConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{info, instrument};

use crate::store::StoreError;

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies any pending migrations to the database at `db_path`.
///
/// # Errors
///
/// Returns [`StoreError`] if the database cannot be opened or a migration
/// fails.
#[instrument]
pub fn run_migrations(db_path: &str) -> Result<(), StoreError> {
    let mut conn = SqliteConnection::establish(db_path)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StoreError::new(format!("Migration failed: {}", e)))?;
    info!(count = applied.len(), "Migrations applied");
    Ok(())
}
