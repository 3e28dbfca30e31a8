//! Authentication service.
//!
//! Email and password accounts with argon2id hashes, plus the profile and
//! role operations that touch the same rows.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use waladaw_core::{Email, UserId, UserRole};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::user::{ProfileUpdate, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest accepted display name.
const MAX_DISPLAY_NAME_LENGTH: usize = 60;

/// Registration form fields.
#[derive(Debug, Clone)]
pub struct Registration<'r> {
    pub email: &'r str,
    pub display_name: &'r str,
    pub password: &'r str,
    pub password_confirm: &'r str,
}

/// Authentication service.
///
/// Handles user registration, login, profiles and roles.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` or `AuthError::PasswordMismatch` for bad passwords.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, form: &Registration<'_>, role: UserRole) -> Result<User, AuthError> {
        let email = Email::parse(form.email)?;
        let display_name = validate_display_name(form.display_name)?;
        validate_password(form.password)?;
        if form.password != form.password_confirm {
            return Err(AuthError::PasswordMismatch);
        }

        let password_hash = hash_password(form.password)?;

        let user = self
            .users
            .create_with_password(&email, &display_name, role, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::AccountDisabled` if the account was deactivated.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let password_hash = self
            .users
            .get_password_hash(user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        // Only reveal deactivation to someone who knows the password
        if !user.is_active() {
            return Err(AuthError::AccountDisabled);
        }

        Ok(user)
    }

    /// Get an active user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist or is deactivated.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .filter(User::is_active)
            .ok_or(AuthError::UserNotFound)
    }

    /// Update display name, city and phone.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidProfile` if a field is rejected.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        display_name: &str,
        city: &str,
        phone: &str,
    ) -> Result<User, AuthError> {
        let profile = ProfileUpdate {
            display_name: validate_display_name(display_name)?,
            city: optional_field(city, 80, "City")?,
            phone: optional_field(phone, 30, "Phone")?,
        };
        self.users
            .update_profile(user_id, &profile)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// Give an existing account the admin role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no account uses this email.
    pub async fn promote(&self, email: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.users.set_role(user.id, UserRole::Admin).await?;
        tracing::info!(user_id = %user.id, "user promoted to admin");
        Ok(User {
            role: UserRole::Admin,
            ..user
        })
    }

    /// Set a new password for the account using `email`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no account uses this email and
    /// `AuthError::WeakPassword` if the password is too short.
    pub async fn reset_password(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let password_hash = hash_password(password)?;
        self.users.set_password_hash(user.id, &password_hash).await?;
        tracing::info!(user_id = %user.id, "password reset");
        Ok(user)
    }
}

fn validate_display_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidProfile("Display name is required".to_owned()));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(AuthError::InvalidProfile(format!(
            "Display name must be at most {MAX_DISPLAY_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_owned())
}

fn optional_field(value: &str, max: usize, label: &str) -> Result<Option<String>, AuthError> {
    let value = value.trim();
    if value.chars().count() > max {
        return Err(AuthError::InvalidProfile(format!(
            "{label} must be at most {max} characters"
        )));
    }
    Ok((!value.is_empty()).then(|| value.to_owned()))
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_validate_display_name() {
        assert_eq!(validate_display_name("  Marta ").unwrap(), "Marta");
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"m".repeat(61)).is_err());
    }

    #[test]
    fn test_optional_field() {
        assert_eq!(optional_field("  ", 30, "Phone").unwrap(), None);
        assert_eq!(
            optional_field(" 600 123 123 ", 30, "Phone").unwrap().as_deref(),
            Some("600 123 123")
        );
        assert!(optional_field(&"9".repeat(31), 30, "Phone").is_err());
    }

    #[test]
    fn test_user_messages_hide_internals() {
        assert_eq!(
            AuthError::UserNotFound.user_message(),
            AuthError::InvalidCredentials.user_message()
        );
        assert!(AuthError::PasswordHash.is_internal());
        assert!(!AuthError::PasswordMismatch.is_internal());
    }
}
