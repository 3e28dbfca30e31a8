//! Purchase repository for database operations.
//!
//! Purchases are written once, inside the checkout transaction, and never
//! updated afterwards.

use sqlx::{PgConnection, PgPool};

use waladaw_core::{Price, ProductId, PurchaseId, UserId};

use super::RepositoryError;
use crate::models::purchase::{Purchase, PurchaseDetail, PurchaseLine, SaleLine};

const PURCHASE_SELECT: &str = r"
    SELECT o.id, o.buyer_id, b.display_name AS buyer_name, b.email AS buyer_email,
           o.total, o.shipping_address, o.created_at
    FROM waladaw.purchase o
    JOIN waladaw.user b ON b.id = o.buyer_id
";

/// Repository for purchase database operations.
pub struct PurchaseRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PurchaseRepository<'a> {
    /// Create a new purchase repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A buyer's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_buyer(&self, buyer: UserId) -> Result<Vec<Purchase>, RepositoryError> {
        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "{PURCHASE_SELECT} WHERE o.buyer_id = $1 ORDER BY o.created_at DESC, o.id DESC"
        ))
        .bind(buyer)
        .fetch_all(self.pool)
        .await?;
        Ok(purchases)
    }

    /// The most recent purchases across the marketplace.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest(&self, limit: i64) -> Result<Vec<Purchase>, RepositoryError> {
        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "{PURCHASE_SELECT} ORDER BY o.created_at DESC, o.id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(purchases)
    }

    /// A purchase with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: PurchaseId) -> Result<Option<PurchaseDetail>, RepositoryError> {
        let Some(purchase) =
            sqlx::query_as::<_, Purchase>(&format!("{PURCHASE_SELECT} WHERE o.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?
        else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, PurchaseLine>(
            r"
            SELECT l.id, l.purchase_id, l.product_id, l.seller_id,
                   s.display_name AS seller_name, l.product_name, l.price
            FROM waladaw.purchase_line l
            JOIN waladaw.user s ON s.id = l.seller_id
            WHERE l.purchase_id = $1
            ORDER BY l.id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        if lines.is_empty() {
            return Err(RepositoryError::DataCorruption(format!(
                "purchase {id} has no lines"
            )));
        }

        Ok(Some(PurchaseDetail { purchase, lines }))
    }

    /// Items a seller has sold, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_sales(&self, seller: UserId) -> Result<Vec<SaleLine>, RepositoryError> {
        let sales = sqlx::query_as::<_, SaleLine>(
            r"
            SELECT l.purchase_id, l.product_id, l.product_name, l.price,
                   b.display_name AS buyer_name, o.shipping_address, o.created_at
            FROM waladaw.purchase_line l
            JOIN waladaw.purchase o ON o.id = l.purchase_id
            JOIN waladaw.user b ON b.id = o.buyer_id
            WHERE l.seller_id = $1
            ORDER BY o.created_at DESC, l.id DESC
            ",
        )
        .bind(seller)
        .fetch_all(self.pool)
        .await?;
        Ok(sales)
    }
}

/// Insert the purchase header.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_purchase(
    conn: &mut PgConnection,
    buyer: UserId,
    total: Price,
    shipping_address: &str,
) -> Result<PurchaseId, RepositoryError> {
    let id = sqlx::query_scalar::<_, PurchaseId>(
        r"
        INSERT INTO waladaw.purchase (buyer_id, total, shipping_address)
        VALUES ($1, $2, $3)
        RETURNING id
        ",
    )
    .bind(buyer)
    .bind(total)
    .bind(shipping_address)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Record one line and attach the product to the purchase, clearing its reservation.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the product was sold in the meantime.
/// Returns `RepositoryError::Database` if a statement fails.
pub async fn insert_line(
    conn: &mut PgConnection,
    purchase: PurchaseId,
    product: ProductId,
    seller: UserId,
    product_name: &str,
    price: Price,
) -> Result<(), RepositoryError> {
    let attached = sqlx::query(
        r"
        UPDATE waladaw.product
        SET purchase_id = $2, is_reserved = FALSE, reserved_by = NULL,
            reserved_until = NULL, updated_at = NOW()
        WHERE id = $1 AND purchase_id IS NULL AND deleted_at IS NULL
        ",
    )
    .bind(product)
    .bind(purchase)
    .execute(&mut *conn)
    .await?;
    if attached.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "{product_name} has already been sold"
        )));
    }

    sqlx::query(
        r"
        INSERT INTO waladaw.purchase_line (purchase_id, product_id, seller_id, product_name, price)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(purchase)
    .bind(product)
    .bind(seller)
    .bind(product_name)
    .bind(price)
    .execute(conn)
    .await
    .map_err(|e| super::unique_violation(e, &format!("{product_name} has already been sold")))?;

    Ok(())
}
