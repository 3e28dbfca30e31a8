//! Ratings left by buyers on listings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use waladaw_core::{ProductId, RatingId, UserId};

/// A rating with its author's display name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Rating {
    pub id: RatingId,
    pub user_id: UserId,
    pub author_name: String,
    pub product_id: ProductId,
    /// 1 to 5.
    pub stars: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Average and count of a product's ratings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RatingSummary {
    /// Rounded to one decimal; `None` when unrated.
    pub average: Option<Decimal>,
    pub count: i64,
}

impl RatingSummary {
    /// Average for display, e.g. `4.3`, or `-` when unrated.
    #[must_use]
    pub fn display(&self) -> String {
        self.average
            .map_or_else(|| "-".to_owned(), |avg| format!("{:.1}", avg.round_dp(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_rounds_to_one_decimal() {
        let summary = RatingSummary {
            average: Some(Decimal::new(43333, 4)),
            count: 3,
        };
        assert_eq!(summary.display(), "4.3");
        assert_eq!(RatingSummary::default().display(), "-");
    }
}
