//! Bookmarked listings.

use sqlx::PgPool;

use waladaw_core::{DomainError, DomainResult, ProductId, UserId};

use crate::db::{FavoriteRepository, ProductRepository};
use crate::models::product::Product;
use crate::state::AppState;

pub struct FavoriteService<'a> {
    pool: &'a PgPool,
}

impl<'a> FavoriteService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self { pool: state.pool() }
    }

    /// Flip the bookmark on a listed product and return the new state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for missing or deleted products.
    #[tracing::instrument(skip(self), fields(user_id = %user, product_id = %product_id))]
    pub async fn toggle(&self, user: UserId, product_id: ProductId) -> DomainResult<bool> {
        ProductRepository::new(self.pool)
            .get(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product"))?;

        let favorite = FavoriteRepository::new(self.pool)
            .toggle(user, product_id)
            .await?;
        tracing::debug!(favorite, "favorite toggled");
        Ok(favorite)
    }

    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn list(&self, user: UserId) -> DomainResult<Vec<Product>> {
        Ok(FavoriteRepository::new(self.pool).list(user).await?)
    }

    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn is_favorite(&self, user: UserId, product_id: ProductId) -> DomainResult<bool> {
        Ok(FavoriteRepository::new(self.pool)
            .exists(user, product_id)
            .await?)
    }
}
