//! Domain error type shared by every service operation.
//!
//! Services return [`DomainResult`] instead of panicking or leaking storage
//! errors, so each failure path is visible in the signature. The web layer maps
//! the variants onto flash messages (HTML) or status codes (JSON).

use thiserror::Error;

/// A typed failure of a marketplace operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The referenced entity does not exist (or is soft-deleted).
    #[error("{0} not found")]
    NotFound(String),

    /// The request breaks a business rule (validation, sold item, ...).
    #[error("{0}")]
    BusinessRule(String),

    /// The caller is authenticated but may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A concurrent change won the race. Retrying later may succeed.
    #[error("the operation conflicted with a concurrent change")]
    Conflict,

    /// Infrastructure failure (database, filesystem, ...). Details are logged,
    /// never shown to users.
    #[error("technical error: {0}")]
    Technical(String),
}

impl DomainError {
    /// Shorthand for [`DomainError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Shorthand for [`DomainError::BusinessRule`].
    pub fn rule(message: impl Into<String>) -> Self {
        Self::BusinessRule(message.into())
    }

    /// Shorthand for [`DomainError::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Shorthand for [`DomainError::Technical`].
    pub fn technical(message: impl Into<String>) -> Self {
        Self::Technical(message.into())
    }

    /// Stable machine-readable kind, used in JSON error bodies.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BusinessRule(_) => "business_rule",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict => "conflict",
            Self::Technical(_) => "technical",
        }
    }

    /// Message safe to show to an end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(what) => format!("{what} not found"),
            Self::BusinessRule(message) => message.clone(),
            Self::Forbidden(_) => "You are not allowed to do that".to_owned(),
            Self::Conflict => "Someone else changed this at the same time. Please try again.".to_owned(),
            Self::Technical(_) => "Something went wrong on our side. Please try again later.".to_owned(),
        }
    }
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(DomainError::not_found("product").kind(), "not_found");
        assert_eq!(DomainError::rule("x").kind(), "business_rule");
        assert_eq!(DomainError::forbidden("x").kind(), "forbidden");
        assert_eq!(DomainError::Conflict.kind(), "conflict");
        assert_eq!(DomainError::technical("x").kind(), "technical");
    }

    #[test]
    fn test_user_message_hides_technical_details() {
        let err = DomainError::technical("connection refused to 10.0.0.3:5432");
        assert!(!err.user_message().contains("10.0.0.3"));
        let err = DomainError::forbidden("user 3 is not the seller of product 9");
        assert!(!err.user_message().contains("product 9"));
    }

    #[test]
    fn test_user_message_keeps_business_rules() {
        let err = DomainError::rule("\"Bicicleta\" is no longer available");
        assert_eq!(err.user_message(), "\"Bicicleta\" is no longer available");
        assert_eq!(DomainError::not_found("Product").user_message(), "Product not found");
    }
}
