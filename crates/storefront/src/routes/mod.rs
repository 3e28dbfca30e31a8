//! HTTP route handlers for the marketplace.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Home (latest listings)
//! GET  /health, /health/ready         - Liveness / readiness
//!
//! # Products
//! GET  /products                      - Search and list
//! GET  /products/new, POST /products  - Create listing (multipart)
//! GET  /products/{id}                 - Detail
//! GET  /products/{id}/edit            - Edit form
//! POST /products/{id}                 - Update (multipart)
//! POST /products/{id}/delete          - Soft delete
//!
//! # Cart and purchases (requires auth)
//! GET  /cart                          - Cart with reservation timers
//! POST /cart/add                      - Add and reserve (form: product_id)
//! POST /cart/{id}/remove              - Remove and release
//! POST /cart/{id}/renew               - Extend reservation (form: version)
//! GET  /checkout, POST /checkout      - Shipping form / create purchase
//! GET  /purchases                     - My purchases
//! GET  /purchases/{id}                - Purchase detail
//! GET  /purchases/{id}/invoice.pdf    - PDF invoice
//!
//! # Account (requires auth)
//! GET  /account, POST /account        - Profile
//! GET  /account/products              - My listings
//! GET  /account/sales                 - My sold items
//! GET  /account/favorites             - Bookmarks
//!
//! # Auth
//! GET  /auth/login, POST              - Login (rate limited)
//! GET  /auth/register, POST           - Register (rate limited)
//! POST /auth/logout                   - Logout
//!
//! # Admin (requires admin role)
//! GET  /admin                         - Dashboard
//! GET  /admin/users                   - Users
//! POST /admin/users/{id}/role         - Change role
//! POST /admin/users/{id}/deactivate   - Deactivate
//! POST /admin/users/{id}/reactivate   - Reactivate
//! GET  /admin/products                - All products incl. deleted
//! POST /admin/products/{id}/delete    - Soft delete
//! POST /admin/products/{id}/restore   - Restore
//!
//! # JSON API (401 JSON when unauthenticated)
//! POST   /api/favorites/{product_id}  - Toggle favorite
//! GET    /api/products/{id}/ratings   - Ratings and summary
//! POST   /api/products/{id}/ratings   - Rate
//! DELETE /api/ratings/{id}            - Delete rating
//! ```

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod cart;
pub mod health;
pub mod home;
pub mod products;
pub mod purchases;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use tower_sessions::Session;

use waladaw_core::DomainError;

use crate::error::AppError;
use crate::middleware::{auth_rate_limiter, set_flash};
use crate::models::FlashMessage;
use crate::services::storage::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Multipart overhead allowed on top of the image itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the auth routes router. POSTs are rate limited per client IP.
pub fn auth_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();

    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(limiter.clone())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(limiter)),
        )
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/new", get(products::new_page))
        .route("/{id}", get(products::show).post(products::update))
        .route("/{id}/edit", get(products::edit_page))
        .route("/{id}/delete", post(products::delete))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + FORM_OVERHEAD_BYTES))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/{id}/remove", post(cart::remove))
        .route("/{id}/renew", post(cart::renew))
}

/// Create the purchase routes router.
pub fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(purchases::index))
        .route("/{id}", get(purchases::show))
        .route("/{id}/invoice.pdf", get(purchases::invoice))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index).post(account::update))
        .route("/products", get(account::products))
        .route("/sales", get(account::sales))
        .route("/favorites", get(account::favorites))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::dashboard))
        .route("/users", get(admin::users))
        .route("/users/{id}/role", post(admin::set_role))
        .route("/users/{id}/deactivate", post(admin::deactivate))
        .route("/users/{id}/reactivate", post(admin::reactivate))
        .route("/products", get(admin::products))
        .route("/products/{id}/delete", post(admin::delete_product))
        .route("/products/{id}/restore", post(admin::restore_product))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/favorites/{product_id}", post(api::favorites::toggle))
        .route(
            "/products/{id}/ratings",
            get(api::ratings::list).post(api::ratings::rate),
        )
        .route("/ratings/{id}", delete(api::ratings::delete))
}

/// Create all routes for the marketplace.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route(
            "/checkout",
            get(purchases::checkout_page).post(purchases::checkout),
        )
        .nest("/purchases", purchase_routes())
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
        .nest("/admin", admin_routes())
        .nest("/api", api_routes())
        .fallback(not_found)
}

/// Render the error page for unknown paths.
async fn not_found() -> AppError {
    AppError::NotFound("Page".to_owned())
}

/// Turn a refused operation into a flash message for the next page.
pub(crate) async fn flash_error(session: &Session, err: &DomainError) {
    if let DomainError::Technical(detail) = err {
        tracing::error!(error = %detail, "operation failed");
    } else {
        tracing::debug!(error = %err, "operation refused");
    }
    set_flash(session, FlashMessage::error(err.user_message())).await;
}

pub(crate) async fn flash_success(session: &Session, text: impl Into<String>) {
    set_flash(session, FlashMessage::success(text)).await;
}
