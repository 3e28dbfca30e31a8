//! Cart and checkout against a real `PostgreSQL`.
//!
//! Skipped unless `WALADAW_TEST_DATABASE_URL` is set. Every test registers
//! fresh users so runs do not interfere with each other.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use sqlx::PgPool;
use uuid::Uuid;

use waladaw_core::{DomainError, ProductId, UserRole};
use waladaw_integration_tests::{database_app, get, send, test_config, test_database, test_state};
use waladaw_storefront::db::{CartRepository, ProductRepository, UserRepository};
use waladaw_storefront::models::{CurrentUser, ProductFilter, ProductInput, User};
use waladaw_storefront::services::auth::Registration;
use waladaw_storefront::services::{
    AuthService, CartService, ProductService, PurchaseService, RatingService,
};
use waladaw_storefront::state::AppState;

async fn user(pool: &PgPool, name: &str) -> User {
    let email = format!("{name}-{}@test.waladaw.local", Uuid::new_v4().simple());
    AuthService::new(pool)
        .register(
            &Registration {
                email: &email,
                display_name: name,
                password: "integration-pass",
                password_confirm: "integration-pass",
            },
            UserRole::User,
        )
        .await
        .unwrap()
}

async fn listing(pool: &PgPool, seller: &User) -> ProductId {
    let input =
        ProductInput::parse("Road bike", "Size M", "180.00", "sports", "good", "Valencia").unwrap();
    ProductRepository::new(pool)
        .create(seller.id, &input, None)
        .await
        .unwrap()
}

fn state(pool: PgPool) -> AppState {
    test_state(test_config("postgres://unused"), pool)
}

#[tokio::test]
async fn test_reserved_product_cannot_be_added_by_another_buyer() {
    let Some(pool) = test_database().await else {
        return;
    };
    let seller = user(&pool, "seller").await;
    let first = user(&pool, "first").await;
    let second = user(&pool, "second").await;
    let product = listing(&pool, &seller).await;
    let state = state(pool);
    let cart = CartService::new(&state);

    cart.add(first.id, product).await.unwrap();
    let err = cart.add(second.id, product).await.unwrap_err();
    assert!(matches!(err, DomainError::BusinessRule(_)), "{err:?}");
}

#[tokio::test]
async fn test_seller_cannot_buy_own_product() {
    let Some(pool) = test_database().await else {
        return;
    };
    let seller = user(&pool, "seller").await;
    let product = listing(&pool, &seller).await;
    let state = state(pool);

    let err = CartService::new(&state)
        .add(seller.id, product)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::BusinessRule(_)), "{err:?}");
}

#[tokio::test]
async fn test_double_submitted_checkout_sells_once() {
    let Some(pool) = test_database().await else {
        return;
    };
    let seller = user(&pool, "seller").await;
    let buyer = user(&pool, "buyer").await;
    let product = listing(&pool, &seller).await;
    let state = state(pool.clone());

    CartService::new(&state).add(buyer.id, product).await.unwrap();

    let purchases = PurchaseService::new(&state);
    let (a, b) = tokio::join!(
        purchases.checkout(buyer.id, "Calle Mayor 1, Valencia"),
        purchases.checkout(buyer.id, "Calle Mayor 1, Valencia"),
    );
    assert_eq!(
        usize::from(a.is_ok()) + usize::from(b.is_ok()),
        1,
        "{a:?} / {b:?}"
    );

    let sold = ProductRepository::new(&pool)
        .get_any(product)
        .await
        .unwrap()
        .unwrap();
    assert!(sold.purchase_id.is_some());
    assert!(!sold.is_reserved);
    assert!(CartService::new(&state).list(buyer.id).await.unwrap().lines.is_empty());
}

#[tokio::test]
async fn test_renew_with_stale_version_conflicts() {
    let Some(pool) = test_database().await else {
        return;
    };
    let seller = user(&pool, "seller").await;
    let buyer = user(&pool, "buyer").await;
    let product = listing(&pool, &seller).await;
    let state = state(pool);
    let cart = CartService::new(&state);

    let item = cart.add(buyer.id, product).await.unwrap();
    let version = cart.list(buyer.id).await.unwrap().lines[0].version;

    cart.renew(buyer.id, item, version).await.unwrap();
    let err = cart.renew(buyer.id, item, version).await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict), "{err:?}");

    let current = cart.list(buyer.id).await.unwrap().lines[0].version;
    assert_eq!(current, version + 1);
    cart.renew(buyer.id, item, current).await.unwrap();
}

#[tokio::test]
async fn test_removing_from_cart_releases_the_reservation() {
    let Some(pool) = test_database().await else {
        return;
    };
    let seller = user(&pool, "seller").await;
    let first = user(&pool, "first").await;
    let second = user(&pool, "second").await;
    let product = listing(&pool, &seller).await;
    let state = state(pool.clone());
    let cart = CartService::new(&state);

    let item = cart.add(first.id, product).await.unwrap();
    cart.remove(first.id, item).await.unwrap();

    let released = ProductRepository::new(&pool)
        .get_any(product)
        .await
        .unwrap()
        .unwrap();
    assert!(!released.is_reserved);
    assert_eq!(released.reserved_by, None);
    assert_eq!(cart.count(first.id).await.unwrap(), 0);

    cart.add(second.id, product).await.unwrap();
}

#[tokio::test]
async fn test_sweepers_clear_lapsed_holds() {
    let Some(pool) = test_database().await else {
        return;
    };
    let seller = user(&pool, "seller").await;
    let buyer = user(&pool, "buyer").await;
    let product = listing(&pool, &seller).await;
    let state = state(pool.clone());
    let cart = CartService::new(&state);

    let item = cart.add(buyer.id, product).await.unwrap();
    sqlx::query(
        "UPDATE waladaw.cart_item SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1",
    )
    .bind(item)
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "UPDATE waladaw.product SET reserved_until = NOW() - INTERVAL '1 minute' WHERE id = $1",
    )
    .bind(product)
    .execute(&pool)
    .await
    .unwrap();

    // Other tests may sweep concurrently, so check state rather than counts.
    let products = ProductRepository::new(&pool);
    products.release_expired().await.unwrap();
    CartRepository::new(&pool).delete_expired().await.unwrap();

    let swept = products.get_any(product).await.unwrap().unwrap();
    assert!(!swept.is_reserved);
    assert_eq!(swept.reserved_until, None);
    assert_eq!(cart.count(buyer.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_sweepers_leave_live_holds_alone() {
    let Some(pool) = test_database().await else {
        return;
    };
    let seller = user(&pool, "seller").await;
    let buyer = user(&pool, "buyer").await;
    let product = listing(&pool, &seller).await;
    let state = state(pool.clone());
    let cart = CartService::new(&state);

    cart.add(buyer.id, product).await.unwrap();

    let products = ProductRepository::new(&pool);
    let released = products.release_expired().await.unwrap();
    assert!(!released.contains(&product));
    CartRepository::new(&pool).delete_expired().await.unwrap();

    let held = products.get_any(product).await.unwrap().unwrap();
    assert!(held.is_reserved);
    assert_eq!(held.reserved_by, Some(buyer.id));
    assert_eq!(cart.count(buyer.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_buyers_racing_after_lapsed_reservation_sell_once() {
    let Some(pool) = test_database().await else {
        return;
    };
    let seller = user(&pool, "seller").await;
    let first = user(&pool, "first").await;
    let second = user(&pool, "second").await;
    let product = listing(&pool, &seller).await;
    let state = state(pool.clone());
    let cart = CartService::new(&state);

    cart.add(first.id, product).await.unwrap();
    sqlx::query(
        "UPDATE waladaw.product SET reserved_until = NOW() - INTERVAL '1 minute' WHERE id = $1",
    )
    .bind(product)
    .execute(&pool)
    .await
    .unwrap();
    cart.add(second.id, product).await.unwrap();

    let purchases = PurchaseService::new(&state);
    let (a, b) = tokio::join!(
        purchases.checkout(first.id, "Calle Mayor 1, Valencia"),
        purchases.checkout(second.id, "Calle Colon 5, Valencia"),
    );
    assert_eq!(
        usize::from(a.is_ok()) + usize::from(b.is_ok()),
        1,
        "{a:?} / {b:?}"
    );

    let lines: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM waladaw.purchase_line WHERE product_id = $1")
            .bind(product)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(lines, 1);
}

#[tokio::test]
async fn test_deactivated_sellers_listings_are_hidden_and_unbuyable() {
    let Some(pool) = test_database().await else {
        return;
    };
    let seller = user(&pool, "seller").await;
    let early = user(&pool, "early").await;
    let late = user(&pool, "late").await;
    let product = listing(&pool, &seller).await;
    let state = state(pool.clone());
    let cart = CartService::new(&state);

    cart.add(early.id, product).await.unwrap();
    UserRepository::new(&pool)
        .set_active(seller.id, false)
        .await
        .unwrap();

    let products = ProductRepository::new(&pool);
    assert!(products.get(product).await.unwrap().is_none());
    assert!(!products.latest(100).await.unwrap().iter().any(|p| p.id == product));
    let (found, _) = products.search(&ProductFilter::default()).await.unwrap();
    assert!(!found.iter().any(|p| p.id == product));

    let err = cart.add(late.id, product).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)), "{err:?}");

    let err = PurchaseService::new(&state)
        .checkout(early.id, "Calle Mayor 1, Valencia")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::BusinessRule(_)), "{err:?}");

    // Admins can still see the listing.
    assert!(products.get_any(product).await.unwrap().is_some());
}

#[tokio::test]
async fn test_ratings_of_missing_products_are_not_found() {
    let Some(pool) = test_database().await else {
        return;
    };
    let seller = user(&pool, "seller").await;
    let product = listing(&pool, &seller).await;
    let state = state(pool.clone());

    let ratings = RatingService::new(&state);
    assert!(ratings.list_for_product(product).await.unwrap().is_empty());

    let owner = CurrentUser::from(&seller);
    ProductService::new(&state).delete(&owner, product).await.unwrap();
    let err = ratings.list_for_product(product).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)), "{err:?}");

    let app = database_app(pool);
    let response = send(app.clone(), get(&format!("/api/products/{product}/ratings"))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(app, get("/api/products/2147483647/ratings")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
