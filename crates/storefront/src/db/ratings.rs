//! Rating repository for database operations.

use sqlx::PgPool;

use waladaw_core::{ProductId, RatingId, UserId};

use super::RepositoryError;
use crate::models::rating::{Rating, RatingSummary};

const RATING_SELECT: &str = r"
    SELECT r.id, r.user_id, a.display_name AS author_name, r.product_id, r.stars,
           r.comment, r.created_at, r.updated_at
    FROM waladaw.rating r
    JOIN waladaw.user a ON a.id = r.user_id
";

/// Repository for rating database operations.
pub struct RatingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RatingRepository<'a> {
    /// Create a new rating repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace the user's rating of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn upsert(
        &self,
        user: UserId,
        product: ProductId,
        stars: i16,
        comment: Option<&str>,
    ) -> Result<Rating, RepositoryError> {
        let id = sqlx::query_scalar::<_, RatingId>(
            r"
            INSERT INTO waladaw.rating (user_id, product_id, stars, comment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET stars = EXCLUDED.stars, comment = EXCLUDED.comment, updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(user)
        .bind(product)
        .bind(stars)
        .bind(comment)
        .fetch_one(self.pool)
        .await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Get a rating by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: RatingId) -> Result<Option<Rating>, RepositoryError> {
        let rating = sqlx::query_as::<_, Rating>(&format!("{RATING_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(rating)
    }

    /// A product's ratings, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product: ProductId,
    ) -> Result<Vec<Rating>, RepositoryError> {
        let ratings = sqlx::query_as::<_, Rating>(&format!(
            "{RATING_SELECT} WHERE r.product_id = $1 ORDER BY r.updated_at DESC, r.id DESC"
        ))
        .bind(product)
        .fetch_all(self.pool)
        .await?;
        Ok(ratings)
    }

    /// Average stars (one decimal) and number of ratings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self, product: ProductId) -> Result<RatingSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, RatingSummary>(
            r"
            SELECT ROUND(AVG(stars), 1) AS average, COUNT(*) AS count
            FROM waladaw.rating
            WHERE product_id = $1
            ",
        )
        .bind(product)
        .fetch_one(self.pool)
        .await?;
        Ok(summary)
    }

    /// Delete a rating.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rating does not exist.
    pub async fn delete(&self, id: RatingId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM waladaw.rating WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
