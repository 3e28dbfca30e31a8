//! Favorite toggling.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use waladaw_core::ProductId;

use crate::error::ApiError;
use crate::middleware::RequireAuth;
use crate::services::FavoriteService;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub product_id: ProductId,
    /// State after the toggle.
    pub favorite: bool,
}

/// Add or remove a bookmark.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<i32>,
) -> Result<Json<FavoriteResponse>, ApiError> {
    let product_id = ProductId::new(product_id);
    let favorite = FavoriteService::new(&state)
        .toggle(user.id, product_id)
        .await?;
    Ok(Json(FavoriteResponse {
        product_id,
        favorite,
    }))
}
