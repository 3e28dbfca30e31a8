//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use waladaw_core::ProductCategory;

use crate::error::Result;
use crate::filters;
use crate::middleware::Page;
use crate::models::Product;
use crate::services::ProductService;
use crate::state::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: Page,
    pub latest: Vec<Product>,
    pub categories: &'static [ProductCategory],
}

#[instrument(skip_all)]
pub async fn home(State(state): State<AppState>, page: Page) -> Result<impl IntoResponse> {
    let latest = ProductService::new(&state).latest().await?;
    Ok(HomeTemplate {
        page,
        latest: latest.as_ref().clone(),
        categories: &ProductCategory::ALL,
    })
}
