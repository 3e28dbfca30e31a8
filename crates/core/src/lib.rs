//! WalaDaw Core - Shared domain types library.
//!
//! This crate provides common types used across all WalaDaw components:
//! - `storefront` - The marketplace web application (public site, JSON API, admin dashboard)
//! - `cli` - Command-line tools for migrations, user management and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses
//! - [`error`] - The domain error returned by every service operation
//! - [`reservation`] - Product availability and reservation rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod reservation;
pub mod types;

pub use error::{DomainError, DomainResult};
pub use reservation::{Availability, ProductHold};
pub use types::*;
