//! Authentication route handlers.
//!
//! Email and password login, registration and logout. Failed submissions
//! re-render the form with the error and the non-secret fields filled in.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use waladaw_core::UserRole;

use super::flash_success;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{Page, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::models::user::User;
use crate::services::AuthService;
use crate::services::auth::{AuthError, Registration};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub display_name: String,
    pub password: SecretString,
    pub password_confirm: SecretString,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: Page,
    pub error: Option<String>,
    pub email: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: Page,
    pub error: Option<String>,
    pub email: String,
    pub display_name: String,
}

/// Status code for a rejected form submission.
const fn form_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
        AuthError::AccountDisabled => StatusCode::FORBIDDEN,
        AuthError::UserAlreadyExists => StatusCode::CONFLICT,
        AuthError::Repository(_) | AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Put the user in the session. Failing here leaves the visitor logged out.
async fn start_session(session: &Session, user: &User) -> bool {
    let current = CurrentUser::from(user);
    if let Err(e) = set_current_user(session, &current).await {
        tracing::error!(error = %e, "failed to store user in session");
        return false;
    }
    set_sentry_user(&user.id, Some(user.email.as_str()));
    true
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(page: Page) -> Response {
    if page.user.is_some() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate {
        page,
        error: None,
        email: String::new(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    Form(form): Form<LoginForm>,
) -> Response {
    let result = AuthService::new(state.pool())
        .login(&form.email, form.password.expose_secret())
        .await;

    match result {
        Ok(user) => {
            if !start_session(&session, &user).await {
                return render_login(
                    page,
                    &form.email,
                    "Could not start your session, please try again",
                    StatusCode::INTERNAL_SERVER_ERROR,
                );
            }
            tracing::info!(user_id = %user.id, "user logged in");
            flash_success(&session, format!("Welcome back, {}", user.display_name)).await;
            Redirect::to("/").into_response()
        }
        Err(e) => {
            if e.is_internal() {
                tracing::error!(error = %e, "login failed");
            } else {
                tracing::info!(error = %e, "login refused");
            }
            render_login(page, &form.email, &e.user_message(), form_status(&e))
        }
    }
}

fn render_login(page: Page, email: &str, error: &str, status: StatusCode) -> Response {
    let template = LoginTemplate {
        page,
        error: Some(error.to_owned()),
        email: email.trim().to_owned(),
    };
    (status, template).into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(page: Page) -> Response {
    if page.user.is_some() {
        return Redirect::to("/").into_response();
    }
    RegisterTemplate {
        page,
        error: None,
        email: String::new(),
        display_name: String::new(),
    }
    .into_response()
}

/// Handle registration form submission.
///
/// New accounts are logged in straight away and get a welcome email in the
/// background.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    Form(form): Form<RegisterForm>,
) -> Response {
    let registration = Registration {
        email: &form.email,
        display_name: &form.display_name,
        password: form.password.expose_secret(),
        password_confirm: form.password_confirm.expose_secret(),
    };

    let user = match AuthService::new(state.pool())
        .register(&registration, UserRole::User)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            if e.is_internal() {
                tracing::error!(error = %e, "registration failed");
            }
            let template = RegisterTemplate {
                page,
                error: Some(e.user_message()),
                email: form.email.trim().to_owned(),
                display_name: form.display_name.trim().to_owned(),
            };
            return (form_status(&e), template).into_response();
        }
    };

    let email = state.email().clone();
    let welcome = email.welcome(user.email.as_str(), &user.display_name);
    tokio::spawn(async move { email.send_best_effort(welcome).await });

    if start_session(&session, &user).await {
        flash_success(&session, "Your account is ready").await;
        Redirect::to("/").into_response()
    } else {
        Redirect::to("/auth/login").into_response()
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
pub async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "failed to clear session");
    }
    clear_sentry_user();
    Redirect::to("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_form_status() {
        assert_eq!(
            form_status(&AuthError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(form_status(&AuthError::AccountDisabled), StatusCode::FORBIDDEN);
        assert_eq!(form_status(&AuthError::UserAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(form_status(&AuthError::PasswordMismatch), StatusCode::BAD_REQUEST);
        assert_eq!(
            form_status(&AuthError::PasswordHash),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_login_form_keeps_password_secret() {
        let form: LoginForm = serde_json::from_value(serde_json::json!({
            "email": "ana@mail.com",
            "password": "hunter2hunter2",
        }))
        .unwrap();
        assert_eq!(form.email, "ana@mail.com");
        assert_eq!(form.password.expose_secret(), "hunter2hunter2");
        assert!(!format!("{form:?}").contains("hunter2"));
    }
}
