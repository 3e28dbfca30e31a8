//! Product route handlers: search, detail, and the listing form.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use waladaw_core::{DomainError, ProductCategory, ProductCondition, ProductId};

use super::{flash_error, flash_success};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{OptionalAuth, Page, RequireAuth};
use crate::models::{
    Product, ProductDetail, ProductFilter, ProductInput, ProductPage, ProductSort, Rating,
};
use crate::services::storage::ImageUpload;
use crate::services::{ProductService, RatingService};
use crate::state::AppState;

// =============================================================================
// Search
// =============================================================================

/// Raw search parameters. Unparseable values are ignored rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub city: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub include_sold: Option<String>,
}

impl SearchQuery {
    /// Build the typed filter.
    #[must_use]
    pub fn to_filter(&self) -> ProductFilter {
        ProductFilter {
            query: non_empty(self.q.as_deref()),
            category: self.category.as_deref().and_then(|c| c.parse().ok()),
            min_price: parse_amount(self.min_price.as_deref()),
            max_price: parse_amount(self.max_price.as_deref()),
            city: non_empty(self.city.as_deref()),
            include_sold: self.include_sold.is_some(),
            sort: match self.sort.as_deref() {
                Some("price_asc") => ProductSort::PriceAsc,
                Some("price_desc") => ProductSort::PriceDesc,
                _ => ProductSort::Newest,
            },
            page: self.page.unwrap_or(1).max(1),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn parse_amount(value: Option<&str>) -> Option<Decimal> {
    value
        .map(|v| v.trim().replace(',', "."))
        .and_then(|v| v.parse::<Decimal>().ok())
        .filter(|v| !v.is_sign_negative())
}

/// Query string for `filter` at another page.
#[must_use]
pub fn page_url(filter: &ProductFilter, page: u32) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if let Some(q) = &filter.query {
        query.append_pair("q", q);
    }
    if let Some(category) = filter.category {
        query.append_pair("category", category.slug());
    }
    if let Some(min) = filter.min_price {
        query.append_pair("min_price", &min.to_string());
    }
    if let Some(max) = filter.max_price {
        query.append_pair("max_price", &max.to_string());
    }
    if let Some(city) = &filter.city {
        query.append_pair("city", city);
    }
    if filter.include_sold {
        query.append_pair("include_sold", "on");
    }
    query.append_pair("sort", filter.sort.slug());
    query.append_pair("page", &page.to_string());
    format!("/products?{}", query.finish())
}

#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct IndexTemplate {
    pub page: Page,
    pub filter: ProductFilter,
    pub results: ProductPage,
    pub categories: &'static [ProductCategory],
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl IndexTemplate {
    fn min_price_value(&self) -> String {
        self.filter.min_price.map(|p| p.to_string()).unwrap_or_default()
    }

    fn max_price_value(&self) -> String {
        self.filter.max_price.map(|p| p.to_string()).unwrap_or_default()
    }

    fn category_selected(&self, slug: &str) -> bool {
        self.filter.category.is_some_and(|c| c.slug() == slug)
    }
}

#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    page: Page,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let filter = query.to_filter();
    let results = ProductService::new(&state).search(&filter).await?;

    let prev_url = results
        .has_prev()
        .then(|| page_url(&filter, results.page - 1));
    let next_url = results
        .has_next()
        .then(|| page_url(&filter, results.page + 1));

    Ok(IndexTemplate {
        page,
        filter,
        results,
        categories: &ProductCategory::ALL,
        prev_url,
        next_url,
    })
}

// =============================================================================
// Detail
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ShowTemplate {
    pub page: Page,
    pub detail: ProductDetail,
    pub ratings: Vec<Rating>,
    pub can_manage: bool,
    pub can_rate: bool,
}

#[instrument(skip(state, page, user))]
pub async fn show(
    State(state): State<AppState>,
    page: Page,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse> {
    let id = ProductId::new(id);
    let detail = ProductService::new(&state).detail(user.as_ref(), id).await?;
    let ratings = RatingService::new(&state).list_for_product(id).await?;

    let can_manage = user
        .as_ref()
        .is_some_and(|u| u.id == detail.product.seller_id || u.is_admin());
    let can_rate = user
        .as_ref()
        .is_some_and(|u| u.id != detail.product.seller_id);

    Ok(ShowTemplate {
        page,
        detail,
        ratings,
        can_manage,
        can_rate,
    })
}

// =============================================================================
// Create / Edit
// =============================================================================

/// Raw form values, echoed back when validation fails.
#[derive(Debug, Clone, Default)]
pub struct ProductFormValues {
    pub name: String,
    pub description: String,
    pub price: String,
    pub category: String,
    pub condition: String,
    pub city: String,
}

impl From<&Product> for ProductFormValues {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.amount().to_string(),
            category: product.category.slug().to_owned(),
            condition: product.condition.slug().to_owned(),
            city: product.city.clone().unwrap_or_default(),
        }
    }
}

impl ProductFormValues {
    fn parse(&self) -> std::result::Result<ProductInput, DomainError> {
        ProductInput::parse(
            &self.name,
            &self.description,
            &self.price,
            &self.category,
            &self.condition,
            &self.city,
        )
    }
}

/// A submitted listing form.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub values: ProductFormValues,
    pub image: Option<ImageUpload>,
}

impl ProductForm {
    /// Read every part of the multipart body.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for malformed or oversized bodies.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("invalid form: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            if name == "image" {
                let content_type = field.content_type().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid image upload: {e}")))?;
                // Browsers send an empty part when no file is chosen
                if !bytes.is_empty() {
                    form.image = Some(ImageUpload {
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("invalid form field: {e}")))?;
            match name.as_str() {
                "name" => form.values.name = value,
                "description" => form.values.description = value,
                "price" => form.values.price = value,
                "category" => form.values.category = value,
                "condition" => form.values.condition = value,
                "city" => form.values.city = value,
                _ => {}
            }
        }
        Ok(form)
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct FormTemplate {
    pub page: Page,
    pub title: &'static str,
    pub action: String,
    pub values: ProductFormValues,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub categories: &'static [ProductCategory],
    pub conditions: &'static [ProductCondition],
}

impl FormTemplate {
    fn new_listing(page: Page, values: ProductFormValues, error: Option<String>) -> Self {
        Self {
            page,
            title: "Sell something",
            action: "/products".to_owned(),
            values,
            image_url: None,
            error,
            categories: &ProductCategory::ALL,
            conditions: &ProductCondition::ALL,
        }
    }

    fn edit_listing(
        page: Page,
        id: ProductId,
        values: ProductFormValues,
        image_url: Option<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            page,
            title: "Edit listing",
            action: format!("/products/{id}"),
            values,
            image_url,
            error,
            categories: &ProductCategory::ALL,
            conditions: &ProductCondition::ALL,
        }
    }
}

pub async fn new_page(page: Page, RequireAuth(_user): RequireAuth) -> impl IntoResponse {
    let values = ProductFormValues {
        category: ProductCategory::default().slug().to_owned(),
        condition: ProductCondition::default().slug().to_owned(),
        ..ProductFormValues::default()
    };
    FormTemplate::new_listing(page, values, None)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Response> {
    let form = ProductForm::from_multipart(multipart).await?;
    let created = match form.values.parse() {
        Ok(input) => {
            ProductService::new(&state)
                .create(&user, &input, form.image.as_ref())
                .await
        }
        Err(e) => Err(e),
    };

    match created {
        Ok(id) => {
            flash_success(&session, "Your product is now listed").await;
            Ok(Redirect::to(&format!("/products/{id}")).into_response())
        }
        Err(DomainError::BusinessRule(message)) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            FormTemplate::new_listing(page, form.values, Some(message)),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state, page, user))]
pub async fn edit_page(
    State(state): State<AppState>,
    page: Page,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse> {
    let id = ProductId::new(id);
    let product = ProductService::new(&state).get_for_edit(&user, id).await?;
    Ok(FormTemplate::edit_listing(
        page,
        id,
        ProductFormValues::from(&product),
        product.image_url(),
        None,
    ))
}

#[instrument(skip(state, session, page, user, multipart))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Response> {
    let id = ProductId::new(id);
    let form = ProductForm::from_multipart(multipart).await?;
    let service = ProductService::new(&state);

    let updated = match form.values.parse() {
        Ok(input) => service.update(&user, id, &input, form.image.as_ref()).await,
        Err(e) => Err(e),
    };

    match updated {
        Ok(()) => {
            flash_success(&session, "Listing updated").await;
            Ok(Redirect::to(&format!("/products/{id}")).into_response())
        }
        Err(DomainError::BusinessRule(message)) => {
            let image_url = service
                .get_for_edit(&user, id)
                .await
                .ok()
                .and_then(|p| p.image_url());
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                FormTemplate::edit_listing(page, id, form.values, image_url, Some(message)),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state, session, user))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    let id = ProductId::new(id);
    match ProductService::new(&state).delete(&user, id).await {
        Ok(()) => {
            flash_success(&session, "Listing removed").await;
            Ok(Redirect::to("/account/products"))
        }
        Err(e @ (DomainError::BusinessRule(_) | DomainError::Conflict)) => {
            flash_error(&session, &e).await;
            Ok(Redirect::to(&format!("/products/{id}")))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_to_filter() {
        let query = SearchQuery {
            q: Some("  bici ".to_owned()),
            category: Some("sports".to_owned()),
            min_price: Some("10,5".to_owned()),
            max_price: Some("abc".to_owned()),
            city: Some(String::new()),
            sort: Some("price_desc".to_owned()),
            page: Some(0),
            include_sold: None,
        };
        let filter = query.to_filter();
        assert_eq!(filter.query.as_deref(), Some("bici"));
        assert_eq!(filter.category, Some(ProductCategory::Sports));
        assert_eq!(filter.min_price, Some(Decimal::new(105, 1)));
        assert_eq!(filter.max_price, None);
        assert_eq!(filter.city, None);
        assert_eq!(filter.sort, ProductSort::PriceDesc);
        assert_eq!(filter.page, 1);
        assert!(!filter.include_sold);
    }

    #[test]
    fn test_unknown_values_fall_back() {
        let query = SearchQuery {
            category: Some("cars".to_owned()),
            sort: Some("random".to_owned()),
            min_price: Some("-3".to_owned()),
            ..SearchQuery::default()
        };
        let filter = query.to_filter();
        assert_eq!(filter.category, None);
        assert_eq!(filter.sort, ProductSort::Newest);
        assert_eq!(filter.min_price, None);
    }

    #[test]
    fn test_page_url_keeps_filters() {
        let filter = ProductFilter {
            query: Some("mesa roble".to_owned()),
            category: Some(ProductCategory::Home),
            include_sold: true,
            ..ProductFilter::default()
        };
        assert_eq!(
            page_url(&filter, 2),
            "/products?q=mesa+roble&category=home&include_sold=on&sort=newest&page=2"
        );
    }
}
