//! Product ratings.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use waladaw_core::{ProductId, RatingId};

use crate::error::ApiError;
use crate::middleware::RequireAuth;
use crate::models::Rating;
use crate::services::RatingService;
use crate::services::ratings::RatingInput;
use crate::state::AppState;

/// Body of `POST /api/products/{id}/ratings`.
#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub stars: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatingsResponse {
    pub average: Option<Decimal>,
    pub count: i64,
    pub ratings: Vec<Rating>,
}

pub async fn list(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> Result<Json<RatingsResponse>, ApiError> {
    let product_id = ProductId::new(product_id);
    let service = RatingService::new(&state);
    let ratings = service.list_for_product(product_id).await?;
    let summary = service.summary(product_id).await?;
    Ok(Json(RatingsResponse {
        average: summary.average,
        count: summary.count,
        ratings,
    }))
}

#[tracing::instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn rate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<i32>,
    body: Result<Json<RateRequest>, JsonRejection>,
) -> Result<Json<Rating>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let input = RatingInput::parse(body.stars, body.comment.as_deref())?;
    let rating = RatingService::new(&state)
        .rate(user.id, ProductId::new(product_id), &input)
        .await?;
    Ok(Json(rating))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    RatingService::new(&state)
        .delete(&user, RatingId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
