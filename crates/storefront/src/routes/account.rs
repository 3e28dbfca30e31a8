//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::flash_success;
use crate::error::Result;
use crate::filters;
use crate::middleware::{Page, RequireAuth, set_flash};
use crate::models::{CurrentUser, FlashMessage, Product, SaleLine, User, session_keys};
use crate::services::{AuthService, FavoriteService, ProductService, PurchaseService};
use crate::state::AppState;

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub display_name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub phone: String,
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub page: Page,
    pub user: User,
}

/// The user's own listings, sold and unsold.
#[derive(Template, WebTemplate)]
#[template(path = "account/products.html")]
pub struct AccountProductsTemplate {
    pub page: Page,
    pub products: Vec<Product>,
}

#[derive(Template, WebTemplate)]
#[template(path = "account/sales.html")]
pub struct AccountSalesTemplate {
    pub page: Page,
    pub sales: Vec<SaleLine>,
}

#[derive(Template, WebTemplate)]
#[template(path = "account/favorites.html")]
pub struct AccountFavoritesTemplate {
    pub page: Page,
    pub products: Vec<Product>,
}

/// Display the profile page.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn index(
    State(state): State<AppState>,
    page: Page,
    RequireAuth(current): RequireAuth,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(AccountIndexTemplate { page, user })
}

/// Save the profile and refresh the name shown in the header.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Redirect {
    let result = AuthService::new(state.pool())
        .update_profile(current.id, &form.display_name, &form.city, &form.phone)
        .await;

    match result {
        Ok(user) => {
            let refreshed = CurrentUser::from(&user);
            if let Err(e) = session.insert(session_keys::CURRENT_USER, &refreshed).await {
                tracing::warn!(error = %e, "failed to refresh session user");
            }
            flash_success(&session, "Profile updated").await;
        }
        Err(e) => {
            if e.is_internal() {
                tracing::error!(error = %e, "profile update failed");
            }
            set_flash(&session, FlashMessage::error(e.user_message())).await;
        }
    }
    Redirect::to("/account")
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn products(
    State(state): State<AppState>,
    page: Page,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let products = ProductService::new(&state).list_by_seller(user.id).await?;
    Ok(AccountProductsTemplate { page, products })
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn sales(
    State(state): State<AppState>,
    page: Page,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let sales = PurchaseService::new(&state).list_sales(user.id).await?;
    Ok(AccountSalesTemplate { page, sales })
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn favorites(
    State(state): State<AppState>,
    page: Page,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let products = FavoriteService::new(&state).list(user.id).await?;
    Ok(AccountFavoritesTemplate { page, products })
}
