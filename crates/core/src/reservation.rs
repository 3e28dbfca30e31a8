//! Product availability and reservation rules.
//!
//! A product enters someone's cart by being *reserved*: the row carries a
//! reserved flag, the reserving user and a deadline. These rules decide, for a
//! given viewer and instant, whether the product can be bought. Cart add,
//! checkout and the product page all go through [`ProductHold::availability_for`]
//! so they never disagree.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::UserId;

/// The sale-relevant state of a product row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductHold {
    /// Owner of the listing.
    pub seller_id: UserId,
    /// The product is attached to a purchase.
    pub sold: bool,
    /// The listing is soft-deleted.
    pub deleted: bool,
    /// Raw reserved flag.
    pub is_reserved: bool,
    /// Who holds the reservation.
    pub reserved_by: Option<UserId>,
    /// When the reservation lapses.
    pub reserved_until: Option<DateTime<Utc>>,
}

/// What a viewer may do with a product right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability {
    /// Free to reserve or buy.
    Available,
    /// Held by the viewer until the given instant.
    ReservedByViewer { until: DateTime<Utc> },
    /// Held by another user until the given instant.
    ReservedByOther { until: DateTime<Utc> },
    /// Already attached to a purchase.
    Sold,
    /// Soft-deleted listing.
    Removed,
    /// The viewer is the seller.
    OwnListing,
}

impl ProductHold {
    /// The reservation that is still in force at `now`, if any.
    #[must_use]
    pub fn active_reservation(&self, now: DateTime<Utc>) -> Option<(UserId, DateTime<Utc>)> {
        if !self.is_reserved {
            return None;
        }
        match (self.reserved_by, self.reserved_until) {
            (Some(by), Some(until)) if until > now => Some((by, until)),
            _ => None,
        }
    }

    /// Availability of the product for `viewer` at `now`.
    ///
    /// Anonymous viewers see reservations as held by someone else.
    #[must_use]
    pub fn availability_for(&self, viewer: Option<UserId>, now: DateTime<Utc>) -> Availability {
        if self.deleted {
            return Availability::Removed;
        }
        if self.sold {
            return Availability::Sold;
        }
        if viewer == Some(self.seller_id) {
            return Availability::OwnListing;
        }
        match self.active_reservation(now) {
            Some((by, until)) if Some(by) == viewer => Availability::ReservedByViewer { until },
            Some((_, until)) => Availability::ReservedByOther { until },
            None => Availability::Available,
        }
    }
}

impl Availability {
    /// Whether the viewer may put the product in the cart or pay for it.
    #[must_use]
    pub const fn can_buy(&self) -> bool {
        matches!(self, Self::Available | Self::ReservedByViewer { .. })
    }

    /// Why the product cannot be bought, phrased for the buyer.
    #[must_use]
    pub const fn refusal(&self) -> Option<&'static str> {
        match self {
            Self::Available | Self::ReservedByViewer { .. } => None,
            Self::ReservedByOther { .. } => Some("is reserved by another buyer"),
            Self::Sold => Some("has already been sold"),
            Self::Removed => Some("is no longer listed"),
            Self::OwnListing => Some("is your own listing"),
        }
    }

    /// Short badge text for listings.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::ReservedByViewer { .. } => "In your cart",
            Self::ReservedByOther { .. } => "Reserved",
            Self::Sold => "Sold",
            Self::Removed => "Removed",
            Self::OwnListing => "Your listing",
        }
    }
}

/// Deadline of a reservation placed at `now` for `minutes`.
#[must_use]
pub fn reservation_deadline(now: DateTime<Utc>, minutes: u32) -> DateTime<Utc> {
    now + Duration::minutes(i64::from(minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELLER: UserId = UserId::new(1);
    const BUYER: UserId = UserId::new(2);
    const OTHER: UserId = UserId::new(3);

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    fn free() -> ProductHold {
        ProductHold {
            seller_id: SELLER,
            sold: false,
            deleted: false,
            is_reserved: false,
            reserved_by: None,
            reserved_until: None,
        }
    }

    fn reserved(by: UserId, minutes_left: i64) -> ProductHold {
        ProductHold {
            is_reserved: true,
            reserved_by: Some(by),
            reserved_until: Some(now() + Duration::minutes(minutes_left)),
            ..free()
        }
    }

    #[test]
    fn test_free_product_is_available() {
        assert_eq!(free().availability_for(Some(BUYER), now()), Availability::Available);
        assert_eq!(free().availability_for(None, now()), Availability::Available);
    }

    #[test]
    fn test_seller_sees_own_listing() {
        let availability = free().availability_for(Some(SELLER), now());
        assert_eq!(availability, Availability::OwnListing);
        assert!(!availability.can_buy());
    }

    #[test]
    fn test_reservation_by_viewer_allows_buying() {
        let availability = reserved(BUYER, 5).availability_for(Some(BUYER), now());
        assert!(matches!(availability, Availability::ReservedByViewer { .. }));
        assert!(availability.can_buy());
    }

    #[test]
    fn test_reservation_by_other_blocks_buying() {
        let availability = reserved(OTHER, 5).availability_for(Some(BUYER), now());
        assert!(matches!(availability, Availability::ReservedByOther { .. }));
        assert_eq!(availability.refusal(), Some("is reserved by another buyer"));
    }

    #[test]
    fn test_anonymous_viewer_sees_reserved() {
        let availability = reserved(OTHER, 5).availability_for(None, now());
        assert!(matches!(availability, Availability::ReservedByOther { .. }));
    }

    #[test]
    fn test_expired_reservation_is_ignored() {
        let hold = reserved(OTHER, -1);
        assert_eq!(hold.active_reservation(now()), None);
        assert_eq!(hold.availability_for(Some(BUYER), now()), Availability::Available);
    }

    #[test]
    fn test_reservation_ending_exactly_now_has_lapsed() {
        let hold = reserved(OTHER, 0);
        assert_eq!(hold.availability_for(Some(BUYER), now()), Availability::Available);
    }

    #[test]
    fn test_flag_without_deadline_is_not_a_reservation() {
        let hold = ProductHold {
            is_reserved: true,
            reserved_by: Some(OTHER),
            ..free()
        };
        assert_eq!(hold.active_reservation(now()), None);
    }

    #[test]
    fn test_sold_wins_over_reservation() {
        let hold = ProductHold {
            sold: true,
            ..reserved(BUYER, 5)
        };
        assert_eq!(hold.availability_for(Some(BUYER), now()), Availability::Sold);
    }

    #[test]
    fn test_removed_wins_over_everything() {
        let hold = ProductHold {
            deleted: true,
            sold: true,
            ..free()
        };
        assert_eq!(hold.availability_for(Some(SELLER), now()), Availability::Removed);
    }

    #[test]
    fn test_reservation_deadline() {
        assert_eq!(reservation_deadline(now(), 15), now() + Duration::minutes(15));
    }
}
