//! Domain models for the marketplace.
//!
//! Row types decode straight from sqlx queries (`FromRow`); input types carry
//! already-validated values from forms into the services.

pub mod admin;
pub mod cart;
pub mod product;
pub mod purchase;
pub mod rating;
pub mod session;
pub mod user;

pub use admin::DashboardStats;
pub use cart::{Cart, CartLine};
pub use product::{Product, ProductDetail, ProductFilter, ProductInput, ProductPage, ProductSort};
pub use purchase::{Purchase, PurchaseDetail, PurchaseLine, SaleLine};
pub use rating::{Rating, RatingSummary};
pub use session::{CurrentUser, FlashKind, FlashMessage, keys as session_keys};
pub use user::{ProfileUpdate, User};
