//! Product ratings.

use sqlx::PgPool;

use waladaw_core::{DomainError, DomainResult, ProductId, RatingId, UserId};

use super::cache::CatalogCache;
use crate::db::{ProductRepository, RatingRepository, RepositoryError};
use crate::models::product::Product;
use crate::models::rating::{Rating, RatingSummary};
use crate::models::session::CurrentUser;
use crate::state::AppState;

/// Longest accepted rating comment.
pub const MAX_COMMENT_LENGTH: usize = 1000;

/// A validated rating submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingInput {
    pub stars: i16,
    pub comment: Option<String>,
}

impl RatingInput {
    /// Check the star count and trim the comment. Blank comments become `None`.
    ///
    /// # Errors
    ///
    /// Returns `BusinessRule` for stars outside 1..=5 or an overlong comment.
    pub fn parse(stars: i64, comment: Option<&str>) -> DomainResult<Self> {
        let stars = i16::try_from(stars)
            .ok()
            .filter(|s| (1..=5).contains(s))
            .ok_or_else(|| DomainError::rule("Stars must be between 1 and 5"))?;

        let comment = comment.map(str::trim).filter(|c| !c.is_empty());
        if comment.is_some_and(|c| c.chars().count() > MAX_COMMENT_LENGTH) {
            return Err(DomainError::rule(format!(
                "Comments must be at most {MAX_COMMENT_LENGTH} characters"
            )));
        }

        Ok(Self {
            stars,
            comment: comment.map(str::to_owned),
        })
    }
}

/// Rate listings and read their ratings.
pub struct RatingService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
}

impl<'a> RatingService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            pool: state.pool(),
            cache: state.cache(),
        }
    }

    /// Create or replace the user's rating of a listed product.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for missing products and `BusinessRule` when the
    /// seller rates their own listing.
    #[tracing::instrument(skip(self, input), fields(user_id = %user, product_id = %product_id))]
    pub async fn rate(
        &self,
        user: UserId,
        product_id: ProductId,
        input: &RatingInput,
    ) -> DomainResult<Rating> {
        let product = self.listed(product_id).await?;
        if product.seller_id == user {
            return Err(DomainError::rule("You cannot rate your own product"));
        }

        let rating = RatingRepository::new(self.pool)
            .upsert(user, product_id, input.stars, input.comment.as_deref())
            .await?;

        self.cache.invalidate_product(product_id).await;
        tracing::info!(rating_id = %rating.id, stars = rating.stars, "product rated");
        Ok(rating)
    }

    /// Ratings of a listed product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for missing or deleted products.
    pub async fn list_for_product(&self, product_id: ProductId) -> DomainResult<Vec<Rating>> {
        self.listed(product_id).await?;
        Ok(RatingRepository::new(self.pool)
            .list_for_product(product_id)
            .await?)
    }

    /// Average and count.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn summary(&self, product_id: ProductId) -> DomainResult<RatingSummary> {
        Ok(RatingRepository::new(self.pool).summary(product_id).await?)
    }

    async fn listed(&self, product_id: ProductId) -> DomainResult<Product> {
        ProductRepository::new(self.pool)
            .get(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product"))
    }

    /// Delete a rating. Only its author or an admin may.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    #[tracing::instrument(skip_all, fields(user_id = %user.id, rating_id = %id))]
    pub async fn delete(&self, user: &CurrentUser, id: RatingId) -> DomainResult<()> {
        let repo = RatingRepository::new(self.pool);
        let rating = repo
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Rating"))?;
        if rating.user_id != user.id && !user.is_admin() {
            return Err(DomainError::forbidden(format!(
                "user {} is not the author of rating {id}",
                user.id
            )));
        }

        repo.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => DomainError::not_found("Rating"),
            other => other.into(),
        })?;
        self.cache.invalidate_product(rating.product_id).await;
        tracing::info!("rating deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_valid_rating() {
        let input = RatingInput::parse(4, Some("  Como nuevo  ")).unwrap();
        assert_eq!(input.stars, 4);
        assert_eq!(input.comment.as_deref(), Some("Como nuevo"));
    }

    #[test]
    fn test_parse_rejects_stars_out_of_range() {
        assert!(RatingInput::parse(0, None).is_err());
        assert!(RatingInput::parse(6, None).is_err());
        assert!(RatingInput::parse(i64::MAX, None).is_err());
        assert!(RatingInput::parse(1, None).is_ok());
        assert!(RatingInput::parse(5, None).is_ok());
    }

    #[test]
    fn test_parse_blank_comment_is_none() {
        assert_eq!(RatingInput::parse(3, Some("   ")).unwrap().comment, None);
    }

    #[test]
    fn test_parse_rejects_long_comment() {
        let long = "x".repeat(MAX_COMMENT_LENGTH + 1);
        assert!(RatingInput::parse(3, Some(&long)).is_err());
        let exact = "x".repeat(MAX_COMMENT_LENGTH);
        assert!(RatingInput::parse(3, Some(&exact)).is_ok());
    }
}
