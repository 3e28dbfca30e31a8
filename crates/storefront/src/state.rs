//! Application state shared across handlers.

use std::sync::Arc;

use lettre::transport::smtp::Error as SmtpError;
use sqlx::PgPool;

use crate::config::MarketConfig;
use crate::services::cache::CatalogCache;
use crate::services::email::EmailService;
use crate::services::storage::ImageStorage;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: MarketConfig,
    pool: PgPool,
    cache: CatalogCache,
    storage: ImageStorage,
    email: EmailService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be configured.
    pub fn new(config: MarketConfig, pool: PgPool) -> Result<Self, SmtpError> {
        let email = EmailService::new(&config.email, &config.base_url)?;
        Ok(Self::with_email(config, pool, email))
    }

    /// Create state with an explicit mailer, e.g. [`EmailService::log_only`].
    #[must_use]
    pub fn with_email(config: MarketConfig, pool: PgPool, email: EmailService) -> Self {
        let storage = ImageStorage::new(config.uploads_dir.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cache: CatalogCache::new(),
                storage,
                email,
            }),
        }
    }

    /// Get a reference to the marketplace configuration.
    #[must_use]
    pub fn config(&self) -> &MarketConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn cache(&self) -> &CatalogCache {
        &self.inner.cache
    }

    /// Local image storage for listing photos.
    #[must_use]
    pub fn storage(&self) -> &ImageStorage {
        &self.inner.storage
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }
}
