//! User domain types.

use chrono::{DateTime, Utc};

use waladaw_core::{Email, UserId, UserRole};

/// A marketplace account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email, normalized.
    pub email: Email,
    /// Public name shown on listings and ratings.
    pub display_name: String,
    pub role: UserRole,
    pub city: Option<String>,
    pub phone: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
    /// Set when an admin deactivates the account.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Deactivated users cannot log in.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Validated profile fields editable by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: String,
    pub city: Option<String>,
    pub phone: Option<String>,
}
