//! Aggregate queries for the admin dashboard.

use sqlx::PgPool;

use super::RepositoryError;
use crate::models::admin::DashboardStats;

/// Repository for admin dashboard queries.
pub struct AdminRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminRepository<'a> {
    /// Create a new admin repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Marketplace totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self) -> Result<DashboardStats, RepositoryError> {
        let stats = sqlx::query_as::<_, DashboardStats>(
            r"
            SELECT
                (SELECT COUNT(*) FROM waladaw.user WHERE deleted_at IS NULL) AS users,
                (SELECT COUNT(*) FROM waladaw.product
                    WHERE deleted_at IS NULL AND purchase_id IS NULL) AS active_listings,
                (SELECT COUNT(*) FROM waladaw.product WHERE purchase_id IS NOT NULL) AS sold_products,
                (SELECT COUNT(*) FROM waladaw.purchase) AS purchases,
                (SELECT COALESCE(SUM(total), 0) FROM waladaw.purchase) AS revenue
            ",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }
}
