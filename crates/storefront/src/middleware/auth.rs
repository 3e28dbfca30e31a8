//! Authentication extractors and session helpers.
//!
//! The session only remembers who logged in. Role and account status are
//! re-read from the database once per request, so a role change or a
//! deactivation takes effect on the user's next request.

use axum::{
    Json,
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::db::{RepositoryError, UserRepository};
use crate::models::{CurrentUser, FlashMessage, User, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// HTML requests are redirected to the login page; `/api/` requests get a
/// JSON 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.display_name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a logged-in admin.
pub struct RequireAdmin(pub CurrentUser);

/// Why an authenticated extractor refused the request.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// JSON 401 (for API requests).
    Unauthorized,
    /// Logged in, but not an admin.
    Forbidden,
    /// The user could not be loaded.
    Unavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "unauthorized",
                    "message": "You must be logged in",
                })),
            )
                .into_response(),
            Self::Forbidden => {
                (StatusCode::FORBIDDEN, "You are not allowed to view this page").into_response()
            }
            Self::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable, please try again",
            )
                .into_response(),
        }
    }
}

/// The session user after the per-request refresh, cached in the request
/// extensions so several extractors share one lookup.
#[derive(Clone)]
struct ResolvedUser(Option<CurrentUser>);

/// Identity for a session whose user row is `row`. Missing and deactivated
/// accounts lose their session.
fn refresh(row: Option<&User>) -> Option<CurrentUser> {
    row.filter(|user| user.is_active()).map(CurrentUser::from)
}

/// Load the logged-in user, refreshed from the database.
///
/// A deactivated or deleted account has its session flushed. A changed role
/// or display name is written back to the session.
///
/// # Errors
///
/// Returns `RepositoryError` if the user row cannot be read.
pub async fn resolve_user(
    parts: &mut Parts,
    state: &AppState,
) -> Result<Option<CurrentUser>, RepositoryError> {
    if let Some(ResolvedUser(user)) = parts.extensions.get::<ResolvedUser>() {
        return Ok(user.clone());
    }
    let Some(session) = parts.extensions.get::<Session>().cloned() else {
        return Ok(None);
    };
    let Some(stored) = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
    else {
        parts.extensions.insert(ResolvedUser(None));
        return Ok(None);
    };

    let row = UserRepository::new(state.pool()).get_by_id(stored.id).await?;
    let current = refresh(row.as_ref());

    match &current {
        None => {
            tracing::info!(user_id = %stored.id, "session ended for inactive account");
            if let Err(e) = session.flush().await {
                tracing::warn!(error = %e, "failed to flush session");
            }
        }
        Some(current) if *current != stored => {
            tracing::info!(user_id = %current.id, role = %current.role, "session user refreshed");
            if let Err(e) = session.insert(session_keys::CURRENT_USER, current).await {
                tracing::warn!(error = %e, "failed to refresh session user");
            }
        }
        Some(_) => {}
    }

    parts.extensions.insert(ResolvedUser(current.clone()));
    Ok(current)
}

async fn require_user(parts: &mut Parts, state: &AppState) -> Result<CurrentUser, AuthRejection> {
    match resolve_user(parts, state).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(login_rejection(parts)),
        Err(e) => {
            tracing::error!(error = %e, "failed to load session user");
            Err(AuthRejection::Unavailable)
        }
    }
}

fn login_rejection(parts: &Parts) -> AuthRejection {
    // Nested routers see the URI without their prefix.
    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map_or_else(|| parts.uri.path(), |original| original.0.path());
    if path.starts_with("/api/") {
        AuthRejection::Unauthorized
    } else {
        AuthRejection::RedirectToLogin
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_user(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = require_user(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "non-admin refused");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user. Lookup failures count
/// as anonymous.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve_user(parts, state).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load session user");
            None
        });
        Ok(Self(user))
    }
}

/// Store the logged-in user, rotating the session ID first.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Drop the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be deleted.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

/// Queue a message for the next rendered page. Failures are logged only.
pub async fn set_flash(session: &Session, message: FlashMessage) {
    if let Err(e) = session.insert(session_keys::FLASH, message).await {
        tracing::warn!(error = %e, "failed to store flash message");
    }
}

/// Take (and clear) the pending flash message.
pub async fn take_flash(session: &Session) -> Option<FlashMessage> {
    session
        .remove::<FlashMessage>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;
    use chrono::Utc;
    use waladaw_core::{Email, UserId, UserRole};

    use super::*;

    fn parts(path: &str) -> Parts {
        let (parts, ()) = Request::builder().uri(path).body(()).unwrap().into_parts();
        parts
    }

    fn user(role: UserRole, active: bool) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(7),
            email: Email::parse("lucia@correo.es").unwrap(),
            display_name: "Lucia".to_owned(),
            role,
            city: None,
            phone: None,
            created_at: now,
            updated_at: now,
            deleted_at: (!active).then_some(now),
        }
    }

    #[test]
    fn test_api_paths_get_json_rejection() {
        assert_eq!(login_rejection(&parts("/api/favorites/1")), AuthRejection::Unauthorized);
        assert_eq!(login_rejection(&parts("/cart")), AuthRejection::RedirectToLogin);
    }

    #[test]
    fn test_nested_api_paths_use_original_uri() {
        let mut nested = parts("/favorites/1");
        nested
            .extensions
            .insert(OriginalUri("/api/favorites/1".parse().unwrap()));
        assert_eq!(login_rejection(&nested), AuthRejection::Unauthorized);
    }

    #[test]
    fn test_refresh_takes_role_from_row() {
        let demoted = refresh(Some(&user(UserRole::User, true))).unwrap();
        assert_eq!(demoted.role, UserRole::User);
        assert!(!demoted.is_admin());

        let promoted = refresh(Some(&user(UserRole::Admin, true))).unwrap();
        assert!(promoted.is_admin());
    }

    #[test]
    fn test_refresh_drops_inactive_and_missing_accounts() {
        assert_eq!(refresh(Some(&user(UserRole::Admin, false))), None);
        assert_eq!(refresh(None), None);
    }

    #[test]
    fn test_rejection_statuses() {
        assert_eq!(
            AuthRejection::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::RedirectToLogin.into_response().status(),
            StatusCode::SEE_OTHER
        );
        assert_eq!(
            AuthRejection::Unavailable.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
