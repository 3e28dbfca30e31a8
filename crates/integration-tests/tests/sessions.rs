//! Logged-in sessions against a real `PostgreSQL`.
//!
//! Skipped unless `WALADAW_TEST_DATABASE_URL` is set.

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use waladaw_core::UserRole;
use waladaw_integration_tests::{
    database_app, form_post, get_with_cookie, send, session_cookie, test_database,
};
use waladaw_storefront::db::UserRepository;
use waladaw_storefront::models::User;
use waladaw_storefront::services::AuthService;
use waladaw_storefront::services::auth::Registration;

const PASSWORD: &str = "integration-pass";

async fn account(pool: &PgPool, name: &str, role: UserRole) -> User {
    let email = format!("{name}-{}@test.waladaw.local", Uuid::new_v4().simple());
    AuthService::new(pool)
        .register(
            &Registration {
                email: &email,
                display_name: name,
                password: PASSWORD,
                password_confirm: PASSWORD,
            },
            role,
        )
        .await
        .unwrap()
}

async fn log_in(app: &Router, user: &User) -> String {
    let body = format!(
        "email={}&password={PASSWORD}",
        user.email.as_str().replace('@', "%40")
    );
    let response = send(app.clone(), form_post("/auth/login", &body)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER, "{}", response.body);
    session_cookie(&response).unwrap()
}

#[tokio::test]
async fn test_demoted_admin_loses_admin_pages_on_next_request() {
    let Some(pool) = test_database().await else {
        return;
    };
    let admin = account(&pool, "admin", UserRole::Admin).await;
    let app = database_app(pool.clone());
    let cookie = log_in(&app, &admin).await;

    let response = send(app.clone(), get_with_cookie("/admin", &cookie)).await;
    assert_eq!(response.status, StatusCode::OK);

    UserRepository::new(&pool)
        .set_role(admin.id, UserRole::User)
        .await
        .unwrap();

    let response = send(app.clone(), get_with_cookie("/admin", &cookie)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // Still logged in as a regular user.
    let response = send(app, get_with_cookie("/cart", &cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_deactivated_user_is_logged_out() {
    let Some(pool) = test_database().await else {
        return;
    };
    let user = account(&pool, "member", UserRole::User).await;
    let app = database_app(pool.clone());
    let cookie = log_in(&app, &user).await;

    let response = send(app.clone(), get_with_cookie("/cart", &cookie)).await;
    assert_eq!(response.status, StatusCode::OK);

    let users = UserRepository::new(&pool);
    users.set_active(user.id, false).await.unwrap();

    let response = send(app.clone(), get_with_cookie("/cart", &cookie)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/auth/login"));

    // The session was ended, not just refused.
    users.set_active(user.id, true).await.unwrap();
    let response = send(app, get_with_cookie("/cart", &cookie)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_deactivated_user_gets_json_401_from_api() {
    let Some(pool) = test_database().await else {
        return;
    };
    let user = account(&pool, "member", UserRole::User).await;
    let app = database_app(pool.clone());
    let cookie = log_in(&app, &user).await;

    UserRepository::new(&pool)
        .set_active(user.id, false)
        .await
        .unwrap();

    let request = Request::post("/api/favorites/1")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["error"], "unauthorized");
}
