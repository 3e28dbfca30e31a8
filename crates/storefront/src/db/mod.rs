//! Database operations for the marketplace `PostgreSQL` database.
//!
//! # Schema: `waladaw`
//!
//! ## Tables
//!
//! - `user` / `user_password` - Accounts and argon2 password hashes
//! - `product` - Listings, with sale (`purchase_id`) and reservation columns
//! - `purchase` / `purchase_line` - Immutable purchase records with price snapshots
//! - `cart_item` - Cart rows; each one backs a product reservation
//! - `favorite`, `rating` - Per-user product bookmarks and 1-5 star ratings
//! - `tower_sessions.session` - Session storage (created by the session store)
//!
//! Soft-deleted rows (`deleted_at IS NOT NULL`) are filtered out of every
//! read that is not explicitly an admin view.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p waladaw-cli -- migrate
//! ```

pub mod admin;
pub mod cart;
pub mod favorites;
pub mod products;
pub mod purchases;
pub mod ratings;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use waladaw_core::DomainError;

pub use admin::AdminRepository;
pub use cart::CartRepository;
pub use favorites::FavoriteRepository;
pub use products::ProductRepository;
pub use purchases::PurchaseRepository;
pub use ratings::RatingRepository;
pub use users::UserRepository;

/// SQLSTATE raised by `PostgreSQL` when a serializable transaction cannot commit.
const SERIALIZATION_FAILURE: &str = "40001";

/// SQLSTATE raised when the deadlock detector aborts a transaction.
const DEADLOCK_DETECTED: &str = "40P01";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Whether this error is a transaction conflict worth retrying.
    #[must_use]
    pub fn is_serialization_conflict(&self) -> bool {
        match self {
            Self::Database(e) => is_serialization_failure(e),
            _ => false,
        }
    }
}

impl From<RepositoryError> for DomainError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::not_found("Record"),
            RepositoryError::Conflict(message) => Self::BusinessRule(message),
            err if err.is_serialization_conflict() => Self::Conflict,
            err => {
                tracing::error!(error = %err, "repository operation failed");
                Self::Technical(err.to_string())
            }
        }
    }
}

/// Whether a sqlx error is a serialization failure or deadlock.
#[must_use]
pub fn is_serialization_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED),
        _ => false,
    }
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn unique_violation(err: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(err)
}

/// Embedded schema migrations from `crates/storefront/migrations/`.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_domain_not_found() {
        let err: DomainError = RepositoryError::NotFound.into();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn test_conflict_maps_to_business_rule() {
        let err: DomainError = RepositoryError::Conflict("email already exists".into()).into();
        assert_eq!(err, DomainError::rule("email already exists"));
    }

    #[test]
    fn test_non_database_errors_are_not_conflicts() {
        assert!(!is_serialization_failure(&sqlx::Error::RowNotFound));
        assert!(!RepositoryError::DataCorruption("bad".into()).is_serialization_conflict());
    }

    #[test]
    fn test_generic_database_error_is_technical() {
        let err: DomainError = RepositoryError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, DomainError::Technical(_)));
    }
}
