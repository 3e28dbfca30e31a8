//! Business logic services for the marketplace.
//!
//! Services borrow what they need from [`AppState`](crate::state::AppState)
//! and return [`DomainResult`](waladaw_core::DomainResult), so route handlers
//! only translate outcomes into responses.
//!
//! # Services
//!
//! - `auth` - Registration, password login, profiles
//! - `products` - Listings: create, edit, delete, search, detail
//! - `cart` - Cart lines and product reservations
//! - `purchases` - Checkout, purchase history, sales, invoices
//! - `ratings` / `favorites` - Buyer feedback and bookmarks
//! - `admin` - Dashboard and user moderation
//! - `cache`, `email`, `storage`, `invoice`, `retry` - Supporting infrastructure

pub mod admin;
pub mod auth;
pub mod cache;
pub mod cart;
pub mod email;
pub mod favorites;
pub mod invoice;
pub mod products;
pub mod purchases;
pub mod ratings;
pub mod retry;
pub mod storage;

pub use admin::AdminService;
pub use auth::{AuthError, AuthService};
pub use cache::CatalogCache;
pub use cart::CartService;
pub use email::EmailService;
pub use favorites::FavoriteService;
pub use invoice::InvoiceService;
pub use products::ProductService;
pub use purchases::PurchaseService;
pub use ratings::RatingService;
pub use storage::ImageStorage;
