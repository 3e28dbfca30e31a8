//! Product listing types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use waladaw_core::{
    Availability, DomainError, Price, ProductCategory, ProductCondition, ProductHold, ProductId,
    PurchaseId, UserId,
};

use super::RatingSummary;

/// Number of listings per search page.
pub const PAGE_SIZE: i64 = 12;

/// A listing, joined with its seller's display name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub seller_name: String,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: ProductCategory,
    pub condition: ProductCondition,
    pub city: Option<String>,
    /// File name under the uploads directory.
    pub image_path: Option<String>,
    /// Set once the product is sold.
    pub purchase_id: Option<PurchaseId>,
    pub is_reserved: bool,
    pub reserved_until: Option<DateTime<Utc>>,
    pub reserved_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Sale-relevant state used by the reservation rules.
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

    #[must_use]
    pub fn availability_for(&self, viewer: Option<UserId>, now: DateTime<Utc>) -> Availability {
        self.hold().availability_for(viewer, now)
    }

    #[must_use]
    pub const fn is_sold(&self) -> bool {
        self.purchase_id.is_some()
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Public URL of the listing image, if any.
    #[must_use]
    pub fn image_url(&self) -> Option<String> {
        self.image_path.as_ref().map(|path| format!("/uploads/{path}"))
    }
}

/// Everything the product page shows.
#[derive(Debug, Clone)]
pub struct ProductDetail {
    pub product: Product,
    pub rating: RatingSummary,
    pub availability: Availability,
    pub is_favorite: bool,
}

/// Validated fields of the create/edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: ProductCategory,
    pub condition: ProductCondition,
    pub city: Option<String>,
}

impl ProductInput {
    pub const NAME_MIN: usize = 3;
    pub const NAME_MAX: usize = 120;
    pub const DESCRIPTION_MAX: usize = 4000;

    /// Validate raw form values.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRule` describing the first invalid field.
    pub fn parse(
        name: &str,
        description: &str,
        price: &str,
        category: &str,
        condition: &str,
        city: &str,
    ) -> Result<Self, DomainError> {
        let name = name.trim();
        let name_len = name.chars().count();
        if !(Self::NAME_MIN..=Self::NAME_MAX).contains(&name_len) {
            return Err(DomainError::rule(format!(
                "Name must be between {} and {} characters",
                Self::NAME_MIN,
                Self::NAME_MAX
            )));
        }

        let description = description.trim();
        if description.chars().count() > Self::DESCRIPTION_MAX {
            return Err(DomainError::rule(format!(
                "Description must be at most {} characters",
                Self::DESCRIPTION_MAX
            )));
        }

        let price = Price::parse(price).map_err(|e| DomainError::rule(capitalize(&e.to_string())))?;
        let category = category
            .parse()
            .map_err(|_| DomainError::rule("Choose a valid category"))?;
        let condition = condition
            .parse()
            .map_err(|_| DomainError::rule("Choose a valid condition"))?;

        let city = city.trim();
        Ok(Self {
            name: name.to_owned(),
            description: description.to_owned(),
            price,
            category,
            condition,
            city: (!city.is_empty()).then(|| city.to_owned()),
        })
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Sort order of search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

impl ProductSort {
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
        }
    }

    pub(crate) const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id DESC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
        }
    }
}

/// Catalog search criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Case-insensitive text matched against name and description.
    pub query: Option<String>,
    pub category: Option<ProductCategory>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub city: Option<String>,
    /// Sold products are hidden unless this is set.
    pub include_sold: bool,
    pub sort: ProductSort,
    /// 1-based page number.
    pub page: u32,
}

impl ProductFilter {
    /// Row offset of the requested page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * PAGE_SIZE
    }
}

/// One page of search results.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub page: u32,
    pub total: i64,
}

impl ProductPage {
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        let pages = (self.total + PAGE_SIZE - 1) / PAGE_SIZE;
        u32::try_from(pages.max(1)).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid(name: &str, price: &str) -> Result<ProductInput, DomainError> {
        ProductInput::parse(name, "Barely used", price, "electronics", "like_new", " Sevilla ")
    }

    #[test]
    fn test_parse_valid_input() {
        let input = valid("  Nintendo Switch ", "180,50").unwrap();
        assert_eq!(input.name, "Nintendo Switch");
        assert_eq!(input.price.amount(), Decimal::new(18050, 2));
        assert_eq!(input.category, ProductCategory::Electronics);
        assert_eq!(input.condition, ProductCondition::LikeNew);
        assert_eq!(input.city.as_deref(), Some("Sevilla"));
    }

    #[test]
    fn test_parse_name_length_bounds() {
        assert!(valid("TV", "10").is_err());
        assert!(valid("Lamp", "10").is_ok());
        assert!(valid(&"x".repeat(120), "10").is_ok());
        assert!(valid(&"x".repeat(121), "10").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_price() {
        let err = valid("Bicycle", "0").unwrap_err();
        assert_eq!(err, DomainError::rule("Price must be greater than zero"));
        assert!(valid("Bicycle", "12.345").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_category() {
        let err = ProductInput::parse("Bicycle", "", "10", "cars", "good", "").unwrap_err();
        assert_eq!(err, DomainError::rule("Choose a valid category"));
    }

    #[test]
    fn test_parse_empty_city_is_none() {
        let input = ProductInput::parse("Bicycle", "", "10", "sports", "good", "  ").unwrap();
        assert_eq!(input.city, None);
    }

    #[test]
    fn test_filter_offset() {
        let mut filter = ProductFilter::default();
        assert_eq!(filter.offset(), 0);
        filter.page = 3;
        assert_eq!(filter.offset(), 24);
    }

    #[test]
    fn test_page_navigation() {
        let page = ProductPage {
            items: Vec::new(),
            page: 2,
            total: 25,
        };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_prev());
        assert!(page.has_next());

        let empty = ProductPage {
            items: Vec::new(),
            page: 1,
            total: 0,
        };
        assert_eq!(empty.total_pages(), 1);
        assert!(!empty.has_next());
    }
}
