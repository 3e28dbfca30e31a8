//! Cart route handlers.

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

use waladaw_core::{CartItemId, ProductId};

use super::{flash_error, flash_success};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{Page, RequireAuth};
use crate::models::Cart;
use crate::services::CartService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddForm {
    pub product_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct RenewForm {
    pub version: i32,
}

#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartTemplate {
    pub page: Page,
    pub cart: Cart,
    pub reservation_minutes: u32,
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    page: Page,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let cart = CartService::new(&state).list(user.id).await?;
    Ok(CartTemplate {
        page,
        cart,
        reservation_minutes: state.config().market.reservation_minutes,
    })
}

#[instrument(skip_all, fields(user_id = %user.id, product_id = form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddForm>,
) -> Redirect {
    let product_id = ProductId::new(form.product_id);
    match CartService::new(&state).add(user.id, product_id).await {
        Ok(_) => {
            let product = product_id.to_string();
            add_breadcrumb("cart", "Reserved product", Some(&[("product_id", product.as_str())]));
            let minutes = state.config().market.reservation_minutes;
            flash_success(
                &session,
                format!("Added to your cart and reserved for {minutes} minutes"),
            )
            .await;
            Redirect::to("/cart")
        }
        Err(e) => {
            flash_error(&session, &e).await;
            Redirect::to(&format!("/products/{product_id}"))
        }
    }
}

#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Redirect {
    match CartService::new(&state)
        .remove(user.id, CartItemId::new(id))
        .await
    {
        Ok(()) => flash_success(&session, "Removed from your cart").await,
        Err(e) => flash_error(&session, &e).await,
    }
    Redirect::to("/cart")
}

#[instrument(skip(state, session, user, form))]
pub async fn renew(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Form(form): Form<RenewForm>,
) -> Redirect {
    match CartService::new(&state)
        .renew(user.id, CartItemId::new(id), form.version)
        .await
    {
        Ok(until) => {
            flash_success(
                &session,
                format!("Reservation extended until {}", until.format("%H:%M UTC")),
            )
            .await;
        }
        Err(e) => flash_error(&session, &e).await,
    }
    Redirect::to("/cart")
}
