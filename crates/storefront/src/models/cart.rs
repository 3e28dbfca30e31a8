//! Cart types.

use chrono::{DateTime, Utc};

use waladaw_core::{
    Availability, CartItemId, Price, ProductHold, ProductId, PurchaseId, UserId,
};

/// A cart row joined with the product it reserves.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLine {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub added_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped on every renewal.
    pub version: i32,
    pub product_name: String,
    pub price: Price,
    pub image_path: Option<String>,
    pub seller_id: UserId,
    pub purchase_id: Option<PurchaseId>,
    pub is_reserved: bool,
    pub reserved_by: Option<UserId>,
    pub reserved_until: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CartLine {
    #[must_use]
    pub const fn hold(&self) -> ProductHold {
        ProductHold {
            seller_id: self.seller_id,
            sold: self.purchase_id.is_some(),
            deleted: self.deleted_at.is_some(),
            is_reserved: self.is_reserved,
            reserved_by: self.reserved_by,
            reserved_until: self.reserved_until,
        }
    }

    /// Availability of the product for the cart owner.
    #[must_use]
    pub fn availability(&self, now: DateTime<Utc>) -> Availability {
        self.hold().availability_for(Some(self.user_id), now)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whole minutes left on the hold, zero once expired.
    #[must_use]
    pub fn minutes_left(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_minutes().max(0)
    }

    #[must_use]
    pub fn image_url(&self) -> Option<String> {
        self.image_path.as_ref().map(|path| format!("/uploads/{path}"))
    }
}

/// A user's cart.
#[derive(Debug, Clone)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    /// Snapshot time used for the per-line expiry state.
    pub now: DateTime<Utc>,
}

impl Cart {
    /// Sum of the line prices.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lines.iter().map(|line| line.price).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines that can still be paid for.
    #[must_use]
    pub fn purchasable(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.availability(self.now).can_buy())
            .count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::Duration;

    use super::*;

    pub(crate) fn line(id: i32, price: &str, now: DateTime<Utc>) -> CartLine {
        CartLine {
            id: CartItemId::new(id),
            user_id: UserId::new(2),
            product_id: ProductId::new(id),
            added_at: now,
            expires_at: now + Duration::minutes(15),
            version: 1,
            product_name: format!("Item {id}"),
            price: Price::parse(price).unwrap(),
            image_path: None,
            seller_id: UserId::new(1),
            purchase_id: None,
            is_reserved: true,
            reserved_by: Some(UserId::new(2)),
            reserved_until: Some(now + Duration::minutes(15)),
            deleted_at: None,
        }
    }

    #[test]
    fn test_total_sums_prices() {
        let now = Utc::now();
        let cart = Cart {
            lines: vec![line(1, "10.10", now), line(2, "0.90", now)],
            now,
        };
        assert_eq!(cart.total(), Price::parse("11").unwrap());
        assert_eq!(cart.purchasable(), 2);
    }

    #[test]
    fn test_expired_line() {
        let now = Utc::now();
        let mut expired = line(1, "5", now);
        expired.expires_at = now - Duration::minutes(1);
        assert!(expired.is_expired(now));
        assert_eq!(expired.minutes_left(now), 0);
        assert!(!line(2, "5", now).is_expired(now));
    }

    #[test]
    fn test_sold_line_is_not_purchasable() {
        let now = Utc::now();
        let mut sold = line(1, "5", now);
        sold.purchase_id = Some(PurchaseId::new(9));
        let cart = Cart {
            lines: vec![sold, line(2, "5", now)],
            now,
        };
        assert_eq!(cart.purchasable(), 1);
    }
}
