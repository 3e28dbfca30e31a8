//! Admin dashboard aggregates.

use waladaw_core::Price;

/// Marketplace totals shown on the admin dashboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DashboardStats {
    /// Active (not deactivated) users.
    pub users: i64,
    /// Listed, unsold, not deleted products.
    pub active_listings: i64,
    pub sold_products: i64,
    pub purchases: i64,
    /// Sum of all purchase totals.
    pub revenue: Price,
}
