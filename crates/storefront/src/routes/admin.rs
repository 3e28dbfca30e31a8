//! Admin dashboard route handlers.
//!
//! Every handler takes [`RequireAdmin`]; the services check the role again.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use waladaw_core::{DomainError, ProductId, UserId, UserRole};

use super::{flash_error, flash_success};
use crate::error::Result;
use crate::filters;
use crate::middleware::{Page, RequireAdmin};
use crate::models::{CurrentUser, Product, User};
use crate::services::admin::Dashboard;
use crate::services::{AdminService, ProductService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub page: Page,
    pub dashboard: Dashboard,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub page: Page,
    pub users: Vec<User>,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/products.html")]
pub struct ProductsTemplate {
    pub page: Page,
    pub products: Vec<Product>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    page: Page,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let dashboard = AdminService::new(&state).dashboard(&admin).await?;
    Ok(DashboardTemplate { page, dashboard })
}

pub async fn users(
    State(state): State<AppState>,
    page: Page,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let users = AdminService::new(&state).users(&admin).await?;
    Ok(UsersTemplate { page, users })
}

#[instrument(skip(state, session, admin))]
pub async fn set_role(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
    Form(form): Form<RoleForm>,
) -> Redirect {
    let result = match form.role.parse::<UserRole>() {
        Ok(role) => AdminService::new(&state)
            .set_role(&admin, UserId::new(id), role)
            .await
            .map(|()| role),
        Err(e) => Err(DomainError::rule(e)),
    };
    match result {
        Ok(role) => flash_success(&session, format!("Role changed to {role}")).await,
        Err(e) => flash_error(&session, &e).await,
    }
    Redirect::to("/admin/users")
}

#[instrument(skip(state, session, admin))]
pub async fn deactivate(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Redirect {
    set_active(&state, &session, &admin, UserId::new(id), false).await
}

#[instrument(skip(state, session, admin))]
pub async fn reactivate(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Redirect {
    set_active(&state, &session, &admin, UserId::new(id), true).await
}

async fn set_active(
    state: &AppState,
    session: &Session,
    admin: &CurrentUser,
    target: UserId,
    active: bool,
) -> Redirect {
    match AdminService::new(state).set_active(admin, target, active).await {
        Ok(()) if active => flash_success(session, "Account reactivated").await,
        Ok(()) => flash_success(session, "Account deactivated").await,
        Err(e) => flash_error(session, &e).await,
    }
    Redirect::to("/admin/users")
}

pub async fn products(
    State(state): State<AppState>,
    page: Page,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let products = ProductService::new(&state).list_all(&admin).await?;
    Ok(ProductsTemplate { page, products })
}

#[instrument(skip(state, session, admin))]
pub async fn delete_product(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Redirect {
    match ProductService::new(&state)
        .delete(&admin, ProductId::new(id))
        .await
    {
        Ok(()) => flash_success(&session, "Product deleted").await,
        Err(e) => flash_error(&session, &e).await,
    }
    Redirect::to("/admin/products")
}

#[instrument(skip(state, session, admin))]
pub async fn restore_product(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Redirect {
    match ProductService::new(&state)
        .restore(&admin, ProductId::new(id))
        .await
    {
        Ok(()) => flash_success(&session, "Product restored").await,
        Err(e) => flash_error(&session, &e).await,
    }
    Redirect::to("/admin/products")
}
