//! Cart repository for database operations.
//!
//! Every statement that changes a cart runs on a caller-supplied connection so
//! the cart service can pair it with the matching product reservation write.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use waladaw_core::{CartItemId, ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::CartLine;

// A deactivated seller's listing reads as deleted so checkout refuses it.
const CART_SELECT: &str = r"
    SELECT c.id, c.user_id, c.product_id, c.added_at, c.expires_at, c.version,
           p.name AS product_name, p.price, p.image_path, p.seller_id, p.purchase_id,
           p.is_reserved, p.reserved_by, p.reserved_until,
           COALESCE(p.deleted_at, s.deleted_at) AS deleted_at
    FROM waladaw.cart_item c
    JOIN waladaw.product p ON p.id = c.product_id
    JOIN waladaw.user s ON s.id = p.seller_id
";

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's cart lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, CartLine>(&format!(
            "{CART_SELECT} WHERE c.user_id = $1 ORDER BY c.added_at, c.id"
        ))
        .bind(user)
        .fetch_all(self.pool)
        .await?;
        Ok(lines)
    }

    /// Number of rows in a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, user: UserId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM waladaw.cart_item WHERE user_id = $1",
        )
        .bind(user)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Delete cart rows whose hold has lapsed. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM waladaw.cart_item WHERE expires_at <= NOW()")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// A user's cart lines with their products locked, for checkout.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_checkout(
    conn: &mut PgConnection,
    user: UserId,
) -> Result<Vec<CartLine>, RepositoryError> {
    let lines = sqlx::query_as::<_, CartLine>(&format!(
        "{CART_SELECT} WHERE c.user_id = $1 ORDER BY c.added_at, c.id FOR UPDATE OF p"
    ))
    .bind(user)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

/// One of a user's cart lines.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    conn: &mut PgConnection,
    user: UserId,
    item: CartItemId,
) -> Result<Option<CartLine>, RepositoryError> {
    let line = sqlx::query_as::<_, CartLine>(&format!(
        "{CART_SELECT} WHERE c.user_id = $1 AND c.id = $2"
    ))
    .bind(user)
    .bind(item)
    .fetch_optional(conn)
    .await?;
    Ok(line)
}

/// Insert a cart row, or refresh its deadline if the product is already in the cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn upsert(
    conn: &mut PgConnection,
    user: UserId,
    product: ProductId,
    expires_at: DateTime<Utc>,
) -> Result<CartItemId, RepositoryError> {
    let id = sqlx::query_scalar::<_, CartItemId>(
        r"
        INSERT INTO waladaw.cart_item (user_id, product_id, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET expires_at = EXCLUDED.expires_at,
                      version = waladaw.cart_item.version + 1
        RETURNING id
        ",
    )
    .bind(user)
    .bind(product)
    .bind(expires_at)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Extend a cart row's deadline if its version still matches.
///
/// Returns `false` when the row is missing or `expected_version` is stale.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn renew(
    conn: &mut PgConnection,
    user: UserId,
    item: CartItemId,
    expected_version: i32,
    expires_at: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE waladaw.cart_item
        SET expires_at = $4, version = version + 1
        WHERE user_id = $1 AND id = $2 AND version = $3
        ",
    )
    .bind(user)
    .bind(item)
    .bind(expected_version)
    .bind(expires_at)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete one of a user's cart rows, returning the product it held.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn delete(
    conn: &mut PgConnection,
    user: UserId,
    item: CartItemId,
) -> Result<Option<ProductId>, RepositoryError> {
    let product = sqlx::query_scalar::<_, ProductId>(
        "DELETE FROM waladaw.cart_item WHERE user_id = $1 AND id = $2 RETURNING product_id",
    )
    .bind(user)
    .bind(item)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

/// Empty a user's cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn clear(conn: &mut PgConnection, user: UserId) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM waladaw.cart_item WHERE user_id = $1")
        .bind(user)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
