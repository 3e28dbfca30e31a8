//! Admin dashboard and user moderation.

use sqlx::PgPool;

use waladaw_core::{DomainError, DomainResult, UserId, UserRole};

use crate::db::{AdminRepository, PurchaseRepository, RepositoryError, UserRepository};
use crate::models::admin::DashboardStats;
use crate::models::purchase::Purchase;
use crate::models::session::CurrentUser;
use crate::models::user::User;
use crate::state::AppState;

/// Purchases listed on the dashboard.
const DASHBOARD_PURCHASES: i64 = 10;

/// Everything the dashboard page shows.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub latest_purchases: Vec<Purchase>,
}

/// Operations reserved for admins. Every method re-checks the role.
pub struct AdminService<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self { pool: state.pool() }
    }

    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins.
    pub async fn dashboard(&self, admin: &CurrentUser) -> DomainResult<Dashboard> {
        ensure_admin(admin)?;
        let stats = AdminRepository::new(self.pool).stats().await?;
        let latest_purchases = PurchaseRepository::new(self.pool)
            .latest(DASHBOARD_PURCHASES)
            .await?;
        Ok(Dashboard {
            stats,
            latest_purchases,
        })
    }

    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins.
    pub async fn users(&self, admin: &CurrentUser) -> DomainResult<Vec<User>> {
        ensure_admin(admin)?;
        Ok(UserRepository::new(self.pool).list_all().await?)
    }

    /// Change another user's role.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admins, `BusinessRule` when targeting
    /// oneself, and `NotFound` for unknown users.
    #[tracing::instrument(skip(self, admin), fields(admin_id = %admin.id))]
    pub async fn set_role(
        &self,
        admin: &CurrentUser,
        target: UserId,
        role: UserRole,
    ) -> DomainResult<()> {
        ensure_admin(admin)?;
        ensure_not_self(admin, target, "You cannot change your own role")?;
        UserRepository::new(self.pool)
            .set_role(target, role)
            .await
            .map_err(user_not_found)?;
        tracing::info!("user role changed");
        Ok(())
    }

    /// Deactivate (`active = false`) or reactivate another account.
    ///
    /// # Errors
    ///
    /// Same as [`AdminService::set_role`].
    #[tracing::instrument(skip(self, admin), fields(admin_id = %admin.id))]
    pub async fn set_active(
        &self,
        admin: &CurrentUser,
        target: UserId,
        active: bool,
    ) -> DomainResult<()> {
        ensure_admin(admin)?;
        ensure_not_self(admin, target, "You cannot deactivate your own account")?;
        UserRepository::new(self.pool)
            .set_active(target, active)
            .await
            .map_err(user_not_found)?;
        tracing::info!("user activation changed");
        Ok(())
    }
}

/// # Errors
///
/// Returns `DomainError::Forbidden` unless the user is an admin.
pub fn ensure_admin(user: &CurrentUser) -> DomainResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(DomainError::forbidden(format!("user {} is not an admin", user.id)))
    }
}

fn ensure_not_self(admin: &CurrentUser, target: UserId, message: &str) -> DomainResult<()> {
    if admin.id == target {
        return Err(DomainError::rule(message));
    }
    Ok(())
}

fn user_not_found(e: RepositoryError) -> DomainError {
    match e {
        RepositoryError::NotFound => DomainError::not_found("User"),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use waladaw_core::Email;

    use super::*;

    fn user(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("admin@waladaw.es").unwrap(),
            display_name: "Admin".to_owned(),
            role,
        }
    }

    #[test]
    fn test_ensure_admin() {
        assert!(ensure_admin(&user(1, UserRole::Admin)).is_ok());
        assert!(matches!(
            ensure_admin(&user(1, UserRole::User)),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn test_admin_cannot_target_self() {
        let admin = user(1, UserRole::Admin);
        assert_eq!(
            ensure_not_self(&admin, UserId::new(1), "nope"),
            Err(DomainError::rule("nope"))
        );
        assert!(ensure_not_self(&admin, UserId::new(2), "nope").is_ok());
    }

    #[test]
    fn test_repository_not_found_maps_to_user() {
        assert_eq!(
            user_not_found(RepositoryError::NotFound),
            DomainError::not_found("User")
        );
    }
}
