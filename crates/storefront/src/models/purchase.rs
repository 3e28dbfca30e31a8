//! Purchase records.

use chrono::{DateTime, Utc};

use waladaw_core::{Email, Price, ProductId, PurchaseId, PurchaseLineId, UserId};

/// A completed purchase with buyer contact data.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Purchase {
    pub id: PurchaseId,
    pub buyer_id: UserId,
    pub buyer_name: String,
    pub buyer_email: Email,
    pub total: Price,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    /// Human-facing purchase number, e.g. `WD-000042`.
    #[must_use]
    pub fn number(&self) -> String {
        format!("WD-{:06}", self.id.as_i32())
    }
}

/// A line of a purchase, frozen at purchase time.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PurchaseLine {
    pub id: PurchaseLineId,
    pub purchase_id: PurchaseId,
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub seller_name: String,
    pub product_name: String,
    pub price: Price,
}

/// A purchase together with its lines.
#[derive(Debug, Clone)]
pub struct PurchaseDetail {
    pub purchase: Purchase,
    pub lines: Vec<PurchaseLine>,
}

impl PurchaseDetail {
    /// Whether `user` sold one of the lines.
    #[must_use]
    pub fn involves_seller(&self, user: UserId) -> bool {
        self.lines.iter().any(|line| line.seller_id == user)
    }
}

/// One of the seller's sold items.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleLine {
    pub purchase_id: PurchaseId,
    pub product_id: ProductId,
    pub product_name: String,
    pub price: Price,
    pub buyer_name: String,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}
