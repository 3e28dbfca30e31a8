//! Cart and reservation service.
//!
//! Putting a product in the cart reserves it for `reservation_minutes`. The
//! product row is locked (`SELECT ... FOR UPDATE`) while the reservation is
//! checked and written, so two buyers cannot both win the same item.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use waladaw_core::reservation::reservation_deadline;
use waladaw_core::{Availability, CartItemId, DomainError, DomainResult, ProductId, UserId};

use super::cache::CatalogCache;
use crate::config::MarketRules;
use crate::db::{CartRepository, RepositoryError, cart, products};
use crate::models::cart::Cart;
use crate::state::AppState;

/// Cart operations for the logged-in user.
pub struct CartService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
    rules: MarketRules,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            pool: state.pool(),
            cache: state.cache(),
            rules: state.config().market,
        }
    }

    /// Add a product and reserve it. Adding it again renews the reservation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for missing or deleted products and `BusinessRule`
    /// for own, sold, or otherwise reserved products.
    #[tracing::instrument(skip(self), fields(user_id = %user, product_id = %product_id))]
    pub async fn add(&self, user: UserId, product_id: ProductId) -> DomainResult<CartItemId> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let product = products::lock_for_update(&mut tx, product_id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| DomainError::not_found("Product"))?;

        let now = Utc::now();
        ensure_buyable(&product.name, product.availability_for(Some(user), now))?;

        let until = reservation_deadline(now, self.rules.reservation_minutes);
        let item = cart::upsert(&mut tx, user, product_id, until).await?;
        products::reserve(&mut tx, product_id, user, until).await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        self.cache.invalidate_product(product_id).await;

        tracing::info!(cart_item_id = %item, %until, "product reserved");
        Ok(item)
    }

    /// Remove a cart line and release its reservation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the line is not in the user's cart.
    #[tracing::instrument(skip(self), fields(user_id = %user, cart_item_id = %item))]
    pub async fn remove(&self, user: UserId, item: CartItemId) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let product_id = cart::delete(&mut tx, user, item)
            .await?
            .ok_or_else(|| DomainError::not_found("Cart item"))?;
        let released = products::release(&mut tx, product_id, user).await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        self.cache.invalidate_product(product_id).await;

        tracing::info!(%product_id, released, "cart item removed");
        Ok(())
    }

    /// Extend a line's hold. `version` is the token the cart page was rendered with.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown lines, `Conflict` for a stale version, and
    /// `BusinessRule` if the product was sold or taken by someone else.
    #[tracing::instrument(skip(self), fields(user_id = %user, cart_item_id = %item))]
    pub async fn renew(
        &self,
        user: UserId,
        item: CartItemId,
        version: i32,
    ) -> DomainResult<DateTime<Utc>> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let line = cart::get(&mut tx, user, item)
            .await?
            .ok_or_else(|| DomainError::not_found("Cart item"))?;
        let product = products::lock_for_update(&mut tx, line.product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product"))?;

        let now = Utc::now();
        ensure_buyable(&product.name, product.availability_for(Some(user), now))?;

        let until = reservation_deadline(now, self.rules.reservation_minutes);
        if !cart::renew(&mut tx, user, item, version, until).await? {
            return Err(DomainError::Conflict);
        }
        products::reserve(&mut tx, line.product_id, user, until).await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        self.cache.invalidate_product(line.product_id).await;

        tracing::info!(%until, "reservation renewed");
        Ok(until)
    }

    /// The user's cart with per-line availability.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn list(&self, user: UserId) -> DomainResult<Cart> {
        let lines = CartRepository::new(self.pool).list(user).await?;
        Ok(Cart {
            lines,
            now: Utc::now(),
        })
    }

    /// Number of lines, for the header badge.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn count(&self, user: UserId) -> DomainResult<i64> {
        Ok(CartRepository::new(self.pool).count(user).await?)
    }
}

/// Reject products the buyer may not reserve or pay for.
///
/// # Errors
///
/// Returns `DomainError::BusinessRule` naming the product and the reason.
pub fn ensure_buyable(product_name: &str, availability: Availability) -> DomainResult<()> {
    match availability.refusal() {
        None => Ok(()),
        Some(reason) => Err(DomainError::rule(format!("\"{product_name}\" {reason}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_buyable() {
        assert!(ensure_buyable("Bike", Availability::Available).is_ok());
        assert!(
            ensure_buyable(
                "Bike",
                Availability::ReservedByViewer { until: Utc::now() }
            )
            .is_ok()
        );
        assert_eq!(
            ensure_buyable("Bike", Availability::Sold),
            Err(DomainError::rule("\"Bike\" has already been sold"))
        );
        assert_eq!(
            ensure_buyable("Bike", Availability::OwnListing),
            Err(DomainError::rule("\"Bike\" is your own listing"))
        );
    }
}
