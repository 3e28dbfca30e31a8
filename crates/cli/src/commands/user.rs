//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! waladaw-cli user create-admin -e admin@example.com -n "Admin" -p 's3cret-pass'
//! waladaw-cli user promote -e ana@example.com
//! waladaw-cli user reset-password -e ana@example.com -p 'new-pass-123'
//! ```

use waladaw_core::UserRole;
use waladaw_storefront::services::AuthService;
use waladaw_storefront::services::auth::{AuthError, Registration};

use super::{CommandError, connect};

/// Errors that can occur during user operations.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{0}")]
    Auth(#[from] AuthError),
}

/// Create a new admin account with a password.
///
/// # Errors
///
/// Returns an error if the input is invalid, the email is taken, or the
/// database is unreachable.
pub async fn create_admin(email: &str, name: &str, password: &str) -> Result<(), UserError> {
    let pool = connect().await?;

    let registration = Registration {
        email,
        display_name: name,
        password,
        password_confirm: password,
    };
    let user = AuthService::new(&pool)
        .register(&registration, UserRole::Admin)
        .await?;

    tracing::info!(
        "Admin created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(())
}

/// Give an existing account the admin role.
///
/// # Errors
///
/// Returns an error if no account uses `email`.
pub async fn promote(email: &str) -> Result<(), UserError> {
    let pool = connect().await?;
    let user = AuthService::new(&pool).promote(email).await?;
    tracing::info!("{} ({}) is now an admin", user.display_name, user.email);
    Ok(())
}

/// Replace the password of an existing account.
///
/// # Errors
///
/// Returns an error if no account uses `email` or the password is too short.
pub async fn reset_password(email: &str, password: &str) -> Result<(), UserError> {
    let pool = connect().await?;
    let user = AuthService::new(&pool).reset_password(email, password).await?;
    tracing::info!("Password updated for {}", user.email);
    Ok(())
}
