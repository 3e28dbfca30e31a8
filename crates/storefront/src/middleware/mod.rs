//! HTTP middleware stack for the marketplace.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction naming)
//! 2. `CatchPanicLayer` (panics become a 500 page)
//! 3. `TraceLayer` (`http_request` span)
//! 4. Request ID (recorded on the span)
//! 5. Security headers (CSP, framing, referrer)
//! 6. Session layer (tower-sessions)
//! 7. Rate limiting on auth POST routes (governor)

pub mod auth;
pub mod page;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAdmin, RequireAuth, clear_current_user, resolve_user, set_current_user,
    set_flash, take_flash,
};
pub use page::Page;
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
