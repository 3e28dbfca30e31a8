//! JSON API routes used by page scripts.
//!
//! Errors render as `{"error": kind, "message": text}` through
//! [`ApiError`](crate::error::ApiError).

pub mod favorites;
pub mod ratings;
