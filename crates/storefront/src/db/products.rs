//! Product repository for database operations.
//!
//! Normal reads hide soft-deleted listings and those of deactivated sellers.
//! The `_any` variants and the admin listing see them too. Reservation writes take a `&mut PgConnection` so the
//! cart and checkout services can run them inside their own transactions.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use waladaw_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::product::{PAGE_SIZE, Product, ProductFilter, ProductInput};

/// Listed products are neither soft-deleted nor owned by a deactivated seller.
const LISTED: &str = "p.deleted_at IS NULL AND s.deleted_at IS NULL";

pub(crate) const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.seller_id, s.display_name AS seller_name, p.name, p.description,
           p.price, p.category, p.condition, p.city, p.image_path, p.purchase_id,
           p.is_reserved, p.reserved_until, p.reserved_by,
           p.created_at, p.updated_at, p.deleted_at
    FROM waladaw.product p
    JOIN waladaw.user s ON s.id = p.seller_id
";

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a listed product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.id = $1 AND {LISTED}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(product)
    }

    /// Get a product whether or not it is deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_any(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Search listed products. Returns the requested page and the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn search(
        &self,
        filter: &ProductFilter,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM waladaw.product p JOIN waladaw.user s ON s.id = p.seller_id WHERE ",
        );
        count.push(LISTED);
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
        query.push(" WHERE ");
        query.push(LISTED);
        push_filters(&mut query, filter);
        query.push(" ORDER BY ");
        query.push(filter.sort.order_by());
        query.push(" LIMIT ");
        query.push_bind(PAGE_SIZE);
        query.push(" OFFSET ");
        query.push_bind(filter.offset());

        let items = query.build_query_as::<Product>().fetch_all(self.pool).await?;
        Ok((items, total))
    }

    /// Newest unsold listings for the home page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r"
            {PRODUCT_SELECT}
            WHERE {LISTED} AND p.purchase_id IS NULL
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// A seller's listings (sold ones included), newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_seller(&self, seller: UserId) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r"
            {PRODUCT_SELECT}
            WHERE p.seller_id = $1 AND p.deleted_at IS NULL
            ORDER BY p.created_at DESC, p.id DESC
            "
        ))
        .bind(seller)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Every product, deleted ones included, for moderation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} ORDER BY p.created_at DESC, p.id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Insert a new listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        seller: UserId,
        input: &ProductInput,
        image_path: Option<&str>,
    ) -> Result<ProductId, RepositoryError> {
        let id = sqlx::query_scalar::<_, ProductId>(
            r"
            INSERT INTO waladaw.product
                (seller_id, name, description, price, category, condition, city, image_path)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(seller)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.category)
        .bind(input.condition)
        .bind(&input.city)
        .bind(image_path)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Update a listing's fields. A `None` image keeps the current one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is missing, deleted or sold.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
        image_path: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE waladaw.product
            SET name = $2, description = $3, price = $4, category = $5, condition = $6,
                city = $7, image_path = COALESCE($8, image_path), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL AND purchase_id IS NULL
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.category)
        .bind(input.condition)
        .bind(&input.city)
        .bind(image_path)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Soft-delete a listing and drop it from every cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is missing or already deleted.
    pub async fn soft_delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE waladaw.product
            SET deleted_at = NOW(), is_reserved = FALSE, reserved_by = NULL,
                reserved_until = NULL, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM waladaw.cart_item WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Undo a soft delete.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is missing or not deleted.
    pub async fn restore(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE waladaw.product
            SET deleted_at = NULL, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NOT NULL
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Clear reservations whose deadline has passed on unsold products.
    ///
    /// Returns the IDs of the released products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn release_expired(&self) -> Result<Vec<ProductId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, ProductId>(
            r"
            UPDATE waladaw.product
            SET is_reserved = FALSE, reserved_by = NULL, reserved_until = NULL
            WHERE is_reserved AND purchase_id IS NULL AND reserved_until <= NOW()
            RETURNING id
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }
}

/// Read a product row and lock it for the rest of the transaction. Listings of
/// deactivated sellers read as missing.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_update(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "{PRODUCT_SELECT} WHERE p.id = $1 AND s.deleted_at IS NULL FOR UPDATE OF p"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

/// Mark a product as reserved by `user` until `until`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn reserve(
    conn: &mut PgConnection,
    id: ProductId,
    user: UserId,
    until: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE waladaw.product
        SET is_reserved = TRUE, reserved_by = $2, reserved_until = $3
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(user)
    .bind(until)
    .execute(conn)
    .await?;
    Ok(())
}

/// Clear the reservation on a product if `user` holds it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn release(
    conn: &mut PgConnection,
    id: ProductId,
    user: UserId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE waladaw.product
        SET is_reserved = FALSE, reserved_by = NULL, reserved_until = NULL
        WHERE id = $1 AND reserved_by = $2 AND purchase_id IS NULL
        ",
    )
    .bind(id)
    .bind(user)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if !filter.include_sold {
        qb.push(" AND p.purchase_id IS NULL");
    }
    if let Some(text) = &filter.query {
        let pattern = format!("%{}%", escape_like(text));
        qb.push(" AND (p.name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR p.description ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
    if let Some(category) = filter.category {
        qb.push(" AND p.category = ");
        qb.push_bind(category);
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND p.price >= ");
        qb.push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND p.price <= ");
        qb.push_bind(max);
    }
    if let Some(city) = &filter.city {
        qb.push(" AND LOWER(p.city) = LOWER(");
        qb.push_bind(city.clone());
        qb.push(")");
    }
}

/// Escape `ILIKE` wildcards so user text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
