//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! waladaw-cli migrate
//! ```
//!
//! Applies the embedded migrations from `crates/storefront/migrations/` and
//! creates the session table used by tower-sessions.

use tower_sessions_sqlx_store::PostgresStore;

use waladaw_storefront::db::MIGRATOR;

use super::{CommandError, connect};

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session store error: {0}")]
    Sessions(#[from] sqlx::Error),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running schema migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
