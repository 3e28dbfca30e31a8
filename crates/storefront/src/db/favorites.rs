//! Favorite repository for database operations.

use sqlx::PgPool;

use waladaw_core::{ProductId, UserId};

use super::RepositoryError;
use super::products::PRODUCT_SELECT;
use crate::models::product::Product;

/// Repository for favorite database operations.
pub struct FavoriteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FavoriteRepository<'a> {
    /// Create a new favorite repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whether the user has bookmarked the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM waladaw.favorite WHERE user_id = $1 AND product_id = $2
            )
            ",
        )
        .bind(user)
        .bind(product)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Flip the bookmark and return the new state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn toggle(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM waladaw.favorite WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user)
        .bind(product)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed == 0 {
            sqlx::query(
                r"
                INSERT INTO waladaw.favorite (user_id, product_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, product_id) DO NOTHING
                ",
            )
            .bind(user)
            .bind(product)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed == 0)
    }

    /// The user's bookmarked products that are still listed, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user: UserId) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r"
            {PRODUCT_SELECT}
            JOIN waladaw.favorite f ON f.product_id = p.id
            WHERE f.user_id = $1 AND p.deleted_at IS NULL AND s.deleted_at IS NULL
            ORDER BY f.created_at DESC, f.id DESC
            "
        ))
        .bind(user)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }
}
