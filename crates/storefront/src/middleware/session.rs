//! Session middleware configuration.
//!
//! Production uses the `PostgreSQL` store from tower-sessions-sqlx-store;
//! tests plug in a `MemoryStore` through the same builder.

use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

use crate::config::MarketConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "waladaw_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer for `store`.
///
/// Cookies are `HttpOnly`, `SameSite=Lax`, and `Secure` when the site is
/// served over https.
#[must_use]
pub fn create_session_layer<S>(store: S, config: &MarketConfig) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
