//! In-memory catalog cache.
//!
//! Wraps product-detail and latest-listing reads in a `moka` cache (60 second
//! TTL). Every write that touches a product calls one of the `invalidate_*`
//! methods so the next read goes to the database.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use waladaw_core::ProductId;

use crate::models::product::Product;
use crate::models::rating::RatingSummary;

const TTL: Duration = Duration::from_secs(60);
const MAX_CAPACITY: u64 = 10_000;

/// Cache key for catalog reads.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Latest,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Arc<CachedProduct>),
    Latest(Arc<Vec<Product>>),
}

/// The viewer-independent part of a product page.
#[derive(Debug, Clone)]
pub struct CachedProduct {
    pub product: Product,
    pub rating: RatingSummary,
}

/// Shared catalog cache. Cheap to clone.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CAPACITY)
            .time_to_live(TTL)
            .build();
        Self { cache }
    }

    pub async fn product(&self, id: ProductId) -> Option<Arc<CachedProduct>> {
        match self.cache.get(&CacheKey::Product(id)).await {
            Some(CacheValue::Product(cached)) => Some(cached),
            _ => None,
        }
    }

    pub async fn insert_product(&self, cached: CachedProduct) -> Arc<CachedProduct> {
        let cached = Arc::new(cached);
        self.cache
            .insert(
                CacheKey::Product(cached.product.id),
                CacheValue::Product(Arc::clone(&cached)),
            )
            .await;
        cached
    }

    pub async fn latest(&self) -> Option<Arc<Vec<Product>>> {
        match self.cache.get(&CacheKey::Latest).await {
            Some(CacheValue::Latest(products)) => Some(products),
            _ => None,
        }
    }

    pub async fn insert_latest(&self, products: Vec<Product>) -> Arc<Vec<Product>> {
        let products = Arc::new(products);
        self.cache
            .insert(CacheKey::Latest, CacheValue::Latest(Arc::clone(&products)))
            .await;
        products
    }

    /// Drop a product's entry and the latest-listings page it may appear on.
    pub async fn invalidate_product(&self, id: ProductId) {
        self.cache.invalidate(&CacheKey::Product(id)).await;
        self.cache.invalidate(&CacheKey::Latest).await;
    }

    /// Drop several products at once.
    pub async fn invalidate_products(&self, ids: &[ProductId]) {
        for id in ids {
            self.cache.invalidate(&CacheKey::Product(*id)).await;
        }
        self.cache.invalidate(&CacheKey::Latest).await;
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;
    use waladaw_core::{Price, ProductCategory, ProductCondition, UserId};

    use super::*;

    pub(crate) fn product(id: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            seller_id: UserId::new(1),
            seller_name: "Lola".to_owned(),
            name: format!("Product {id}"),
            description: String::new(),
            price: Price::from_stored(rust_decimal::Decimal::new(1000, 2)),
            category: ProductCategory::Books,
            condition: ProductCondition::Good,
            city: None,
            image_path: None,
            purchase_id: None,
            is_reserved: false,
            reserved_until: None,
            reserved_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_product_roundtrip_and_invalidation() {
        let cache = CatalogCache::new();
        assert!(cache.product(ProductId::new(1)).await.is_none());

        cache
            .insert_product(CachedProduct {
                product: product(1),
                rating: RatingSummary::default(),
            })
            .await;
        let cached = cache.product(ProductId::new(1)).await;
        assert_eq!(cached.map(|c| c.product.id), Some(ProductId::new(1)));

        cache.invalidate_product(ProductId::new(1)).await;
        assert!(cache.product(ProductId::new(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_product_invalidation_drops_latest() {
        let cache = CatalogCache::new();
        cache.insert_latest(vec![product(1), product(2)]).await;
        assert_eq!(cache.latest().await.map(|l| l.len()), Some(2));

        cache.invalidate_products(&[ProductId::new(2)]).await;
        assert!(cache.latest().await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = CatalogCache::new();
        cache.insert_latest(vec![product(1)]).await;
        cache.invalidate_all().await;
        assert!(cache.latest().await.is_none());
    }
}
