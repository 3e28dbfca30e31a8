//! Checkout and purchase history route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use waladaw_core::{DomainError, PurchaseId};

use super::{flash_error, flash_success};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{Page, RequireAuth};
use crate::models::{Cart, Purchase, PurchaseDetail};
use crate::services::purchases::{MAX_ADDRESS_LENGTH, validate_address};
use crate::services::{CartService, PurchaseService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub shipping_address: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "purchases/checkout.html")]
pub struct CheckoutTemplate {
    pub page: Page,
    pub cart: Cart,
    pub max_address_length: usize,
}

#[derive(Template, WebTemplate)]
#[template(path = "purchases/index.html")]
pub struct IndexTemplate {
    pub page: Page,
    pub purchases: Vec<Purchase>,
}

#[derive(Template, WebTemplate)]
#[template(path = "purchases/show.html")]
pub struct ShowTemplate {
    pub page: Page,
    pub detail: PurchaseDetail,
    pub is_buyer: bool,
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn checkout_page(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let cart = CartService::new(&state).list(user.id).await?;
    if cart.is_empty() {
        flash_error(&session, &DomainError::rule("Your cart is empty")).await;
        return Ok(Redirect::to("/cart").into_response());
    }

    Ok(CheckoutTemplate {
        page,
        cart,
        max_address_length: MAX_ADDRESS_LENGTH,
    }
    .into_response())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Redirect {
    if let Err(e) = validate_address(&form.shipping_address) {
        flash_error(&session, &e).await;
        return Redirect::to("/checkout");
    }

    match PurchaseService::new(&state)
        .checkout(user.id, &form.shipping_address)
        .await
    {
        Ok(purchase_id) => {
            let purchase = purchase_id.to_string();
            add_breadcrumb(
                "checkout",
                "Purchase completed",
                Some(&[("purchase_id", purchase.as_str())]),
            );
            flash_success(&session, "Thank you! Your purchase is confirmed").await;
            Redirect::to(&format!("/purchases/{purchase_id}"))
        }
        Err(e) => {
            flash_error(&session, &e).await;
            Redirect::to("/cart")
        }
    }
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    page: Page,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let purchases = PurchaseService::new(&state).list_for_buyer(user.id).await?;
    Ok(IndexTemplate { page, purchases })
}

#[instrument(skip(state, page, user))]
pub async fn show(
    State(state): State<AppState>,
    page: Page,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse> {
    let detail = PurchaseService::new(&state)
        .get_for_user(&user, PurchaseId::new(id))
        .await?;
    let is_buyer = detail.purchase.buyer_id == user.id;
    Ok(ShowTemplate {
        page,
        detail,
        is_buyer,
    })
}

#[instrument(skip(state, user))]
pub async fn invoice(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Response> {
    let (file_name, bytes) = PurchaseService::new(&state)
        .invoice_pdf(&user, PurchaseId::new(id))
        .await?;

    let disposition = format!("attachment; filename=\"{file_name}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
