//! Product listing service.

use chrono::Utc;
use sqlx::PgPool;

use waladaw_core::{DomainError, DomainResult, ProductId, UserId};

use super::cache::{CachedProduct, CatalogCache};
use super::storage::{ImageStorage, ImageUpload};
use crate::db::{FavoriteRepository, ProductRepository, RatingRepository};
use crate::models::product::{Product, ProductDetail, ProductFilter, ProductInput, ProductPage};
use crate::models::session::CurrentUser;
use crate::state::AppState;

/// Listings shown on the home page.
const LATEST_LIMIT: i64 = 8;

/// Create, edit, delete and read listings.
pub struct ProductService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
    storage: &'a ImageStorage,
}

impl<'a> ProductService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            pool: state.pool(),
            cache: state.cache(),
            storage: state.storage(),
        }
    }

    /// Publish a new listing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRule` for a rejected image.
    #[tracing::instrument(skip_all, fields(seller_id = %seller.id))]
    pub async fn create(
        &self,
        seller: &CurrentUser,
        input: &ProductInput,
        image: Option<&ImageUpload>,
    ) -> DomainResult<ProductId> {
        let image_path = match image {
            Some(upload) => Some(self.storage.save(upload).await?),
            None => None,
        };

        let created = ProductRepository::new(self.pool)
            .create(seller.id, input, image_path.as_deref())
            .await;
        let id = match created {
            Ok(id) => id,
            Err(e) => {
                if let Some(path) = &image_path {
                    self.storage.delete(path).await;
                }
                return Err(e.into());
            }
        };

        self.cache.invalidate_product(id).await;
        tracing::info!(product_id = %id, "product created");
        Ok(id)
    }

    /// A listing the user may edit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden` for other users' listings, or
    /// `BusinessRule` once the product is sold.
    pub async fn get_for_edit(&self, user: &CurrentUser, id: ProductId) -> DomainResult<Product> {
        let product = self.load_listed(id).await?;
        ensure_can_manage(user, &product)?;
        if product.is_sold() {
            return Err(DomainError::rule("Sold products cannot be edited"));
        }
        Ok(product)
    }

    /// Change a listing. A new image replaces and deletes the previous file.
    ///
    /// # Errors
    ///
    /// Same as [`ProductService::get_for_edit`], plus image validation errors.
    #[tracing::instrument(skip_all, fields(user_id = %user.id, product_id = %id))]
    pub async fn update(
        &self,
        user: &CurrentUser,
        id: ProductId,
        input: &ProductInput,
        image: Option<&ImageUpload>,
    ) -> DomainResult<()> {
        let product = self.get_for_edit(user, id).await?;

        let new_image = match image {
            Some(upload) => Some(self.storage.save(upload).await?),
            None => None,
        };

        if let Err(e) = ProductRepository::new(self.pool)
            .update(id, input, new_image.as_deref())
            .await
        {
            if let Some(path) = &new_image {
                self.storage.delete(path).await;
            }
            return Err(match e {
                crate::db::RepositoryError::NotFound => {
                    DomainError::rule("This product can no longer be edited")
                }
                other => other.into(),
            });
        }

        if let (Some(_), Some(old)) = (&new_image, &product.image_path) {
            self.storage.delete(old).await;
        }

        self.cache.invalidate_product(id).await;
        tracing::info!("product updated");
        Ok(())
    }

    /// Soft-delete a listing. Owners cannot delete sold products; admins can.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden`, or `BusinessRule` for sold products.
    #[tracing::instrument(skip_all, fields(user_id = %user.id, product_id = %id))]
    pub async fn delete(&self, user: &CurrentUser, id: ProductId) -> DomainResult<()> {
        // Admins may still take down listings of deactivated sellers.
        let product = ProductRepository::new(self.pool)
            .get_any(id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| DomainError::not_found("Product"))?;
        ensure_can_manage(user, &product)?;
        if product.is_sold() && !user.is_admin() {
            return Err(DomainError::rule("Sold products cannot be deleted"));
        }

        ProductRepository::new(self.pool).soft_delete(id).await?;
        self.cache.invalidate_product(id).await;
        tracing::info!("product deleted");
        Ok(())
    }

    /// Undo a soft delete (admins only).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins and `NotFound` if the product is not deleted.
    #[tracing::instrument(skip_all, fields(user_id = %admin.id, product_id = %id))]
    pub async fn restore(&self, admin: &CurrentUser, id: ProductId) -> DomainResult<()> {
        if !admin.is_admin() {
            return Err(DomainError::forbidden("only admins can restore products"));
        }
        ProductRepository::new(self.pool)
            .restore(id)
            .await
            .map_err(|e| match e {
                crate::db::RepositoryError::NotFound => DomainError::not_found("Deleted product"),
                other => other.into(),
            })?;
        self.cache.invalidate_product(id).await;
        tracing::info!("product restored");
        Ok(())
    }

    /// Search the catalog.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn search(&self, filter: &ProductFilter) -> DomainResult<ProductPage> {
        let (items, total) = ProductRepository::new(self.pool).search(filter).await?;
        Ok(ProductPage {
            items,
            page: filter.page.max(1),
            total,
        })
    }

    /// Newest listings, served from the cache.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn latest(&self) -> DomainResult<std::sync::Arc<Vec<Product>>> {
        if let Some(products) = self.cache.latest().await {
            return Ok(products);
        }
        let products = ProductRepository::new(self.pool).latest(LATEST_LIMIT).await?;
        Ok(self.cache.insert_latest(products).await)
    }

    /// Everything the product page needs, for an optional viewer.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for missing or deleted products.
    pub async fn detail(
        &self,
        viewer: Option<&CurrentUser>,
        id: ProductId,
    ) -> DomainResult<ProductDetail> {
        let cached = match self.cache.product(id).await {
            Some(cached) => cached,
            None => {
                let product = self.load_listed(id).await?;
                let rating = RatingRepository::new(self.pool).summary(id).await?;
                self.cache.insert_product(CachedProduct { product, rating }).await
            }
        };

        let viewer_id = viewer.map(|v| v.id);
        let is_favorite = match viewer_id {
            Some(user) => FavoriteRepository::new(self.pool).exists(user, id).await?,
            None => false,
        };

        Ok(ProductDetail {
            availability: cached.product.availability_for(viewer_id, Utc::now()),
            product: cached.product.clone(),
            rating: cached.rating,
            is_favorite,
        })
    }

    /// A seller's own listings.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn list_by_seller(&self, seller: UserId) -> DomainResult<Vec<Product>> {
        Ok(ProductRepository::new(self.pool).list_by_seller(seller).await?)
    }

    /// All products including deleted ones (admins only).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins.
    pub async fn list_all(&self, admin: &CurrentUser) -> DomainResult<Vec<Product>> {
        if !admin.is_admin() {
            return Err(DomainError::forbidden("admin only"));
        }
        Ok(ProductRepository::new(self.pool).list_all().await?)
    }

    async fn load_listed(&self, id: ProductId) -> DomainResult<Product> {
        ProductRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product"))
    }
}

/// Owners and admins may change a listing.
///
/// # Errors
///
/// Returns `DomainError::Forbidden` for anyone else.
pub fn ensure_can_manage(user: &CurrentUser, product: &Product) -> DomainResult<()> {
    if user.id == product.seller_id || user.is_admin() {
        Ok(())
    } else {
        Err(DomainError::forbidden(format!(
            "user {} does not own product {}",
            user.id, product.id
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use waladaw_core::{Email, UserRole};

    use super::*;
    use crate::services::cache::tests::product;

    fn user(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse(&format!("user{id}@correo.es")).unwrap(),
            display_name: format!("User {id}"),
            role,
        }
    }

    #[test]
    fn test_owner_can_manage() {
        assert!(ensure_can_manage(&user(1, UserRole::User), &product(5)).is_ok());
    }

    #[test]
    fn test_admin_can_manage_any_listing() {
        assert!(ensure_can_manage(&user(99, UserRole::Admin), &product(5)).is_ok());
    }

    #[test]
    fn test_stranger_is_forbidden() {
        let err = ensure_can_manage(&user(2, UserRole::User), &product(5)).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }
}
