use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use bazaar_commerce::service::{CouponQuote, NewProduct, NewStore, ProductPatch, StatusChange, StorePatch};
use bazaar_commerce::{
    CartView, Category, CheckoutRequest, Order, OrderStatus, PlacedOrder, Product, ProductFilter, Review,
    ReviewInput, Store, WishlistEntry,
};
use bazaar_shared::models::events::DomainEvent;
use bazaar_shared::sum_money;

use crate::error::ApiResult;
use crate::middleware::auth::{require_user, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/v1/shop/stores", get(active_stores))
        .route("/v1/shop/categories", get(list_categories))
        .route("/v1/shop/products", get(list_products))
        .route("/v1/shop/products/{id}", get(product))
        .route("/v1/shop/products/{id}/reviews", get(product_reviews));

    let signed_in = Router::new()
        .route("/v1/shop/products/{id}/reviews", post(create_review))
        .route("/v1/shop/reviews/{id}", put(update_review).delete(delete_review))
        .route("/v1/shop/wishlist", get(wishlist).post(add_to_wishlist))
        .route("/v1/shop/wishlist/{product_id}", delete(remove_from_wishlist))
        .route("/v1/shop/cart", get(cart).post(add_to_cart))
        .route("/v1/shop/cart/{item_id}", put(update_cart_item).delete(remove_cart_item))
        .route("/v1/shop/coupons/quote", post(quote_coupon))
        .route("/v1/shop/checkout", post(checkout))
        .route("/v1/shop/orders", get(my_orders))
        .route("/v1/shop/orders/{id}", get(order_detail))
        .route("/v1/shop/orders/{id}/cancel", post(cancel_order))
        .route("/v1/merchant/stores", get(my_stores).post(create_store))
        .route("/v1/merchant/stores/{id}", put(update_store))
        .route("/v1/merchant/stores/{id}/products", get(store_products))
        .route("/v1/merchant/products", post(create_product))
        .route("/v1/merchant/products/{id}", put(update_product))
        .route("/v1/merchant/orders", get(store_orders))
        .route("/v1/merchant/orders/{id}", get(store_order))
        .route("/v1/merchant/orders/{id}/status", post(advance_order))
        .route_layer(middleware::from_fn_with_state(state, require_user));

    public.merge(signed_in)
}

/// Delivered-and-paid orders settle during a status change; announce it.
pub(crate) fn publish_settlement(state: &AppState, change: &StatusChange) {
    if let Some(settlement) = &change.settlement {
        state.publish(DomainEvent::OrderDelivered {
            order_id: settlement.order_id,
            commission: settlement.split.commission,
            payout: settlement.split.payout,
        });
    }
}

// Catalog

async fn active_stores(State(state): State<AppState>) -> ApiResult<Json<Vec<Store>>> {
    Ok(Json(state.commerce.active_stores().await?))
}

async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.commerce.list_categories().await?))
}

async fn list_products(State(state): State<AppState>, Query(filter): Query<ProductFilter>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.commerce.list_products(filter).await?))
}

async fn product(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Product>> {
    Ok(Json(state.commerce.product(id).await?))
}

// Reviews and wishlist

async fn product_reviews(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<Review>>> {
    Ok(Json(state.commerce.product_reviews(id).await?))
}

async fn create_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewInput>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let review = state.commerce.create_review(claims.sub, id, req).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn update_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewInput>,
) -> ApiResult<Json<Review>> {
    Ok(Json(state.commerce.update_review(claims.sub, id, req).await?))
}

async fn delete_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.commerce.delete_review(claims.sub, id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
struct WishlistAdd {
    product_id: Uuid,
}

async fn wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<WishlistEntry>>> {
    Ok(Json(state.commerce.wishlist(claims.sub).await?))
}

/// 201 when the product was added, 200 when it was already listed.
async fn add_to_wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<WishlistAdd>,
) -> ApiResult<(StatusCode, Json<WishlistEntry>)> {
    let (entry, created) = state.commerce.add_to_wishlist(claims.sub, req.product_id).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(entry)))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.commerce.remove_from_wishlist(claims.sub, product_id).await?;
    Ok(Json(serde_json::json!({ "deleted": product_id })))
}

// Cart

#[derive(Debug, Deserialize)]
struct AddToCart {
    product_id: Uuid,
    #[serde(default = "one")]
    quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
struct QuantityUpdate {
    quantity: i32,
}

async fn cart(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<CartView>> {
    Ok(Json(state.commerce.cart(claims.sub).await?))
}

async fn add_to_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddToCart>,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.commerce.add_to_cart(claims.sub, req.product_id, req.quantity).await?))
}

async fn update_cart_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(item_id): Path<Uuid>,
    Json(req): Json<QuantityUpdate>,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.commerce.update_cart_item(claims.sub, item_id, req.quantity).await?))
}

async fn remove_cart_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.commerce.remove_cart_item(claims.sub, item_id).await?))
}

#[derive(Debug, Deserialize)]
struct QuoteRequest {
    code: String,
}

async fn quote_coupon(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<QuoteRequest>,
) -> ApiResult<Json<CouponQuote>> {
    Ok(Json(state.commerce.quote_coupon(claims.sub, &req.code).await?))
}

// Orders

async fn checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<Json<Vec<PlacedOrder>>> {
    let orders = state.commerce.checkout(claims.sub, req).await?;
    state.publish(DomainEvent::OrderPlaced {
        order_ids: orders.iter().map(|o| o.order.id).collect(),
        user_id: claims.sub,
        total: sum_money(orders.iter().map(|o| &o.order.total)),
    });
    Ok(Json(orders))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: Option<OrderStatus>,
}

async fn my_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<StatusQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.commerce.my_orders(claims.sub, q.status).await?))
}

async fn order_detail(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PlacedOrder>> {
    Ok(Json(state.commerce.order_detail(claims.sub, id).await?))
}

async fn cancel_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.commerce.cancel_order(claims.sub, id).await?))
}

// Merchant

async fn my_stores(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<Vec<Store>>> {
    Ok(Json(state.commerce.my_stores(claims.sub).await?))
}

async fn create_store(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<NewStore>,
) -> ApiResult<Json<Store>> {
    Ok(Json(state.commerce.create_store(claims.sub, input).await?))
}

async fn update_store(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<StorePatch>,
) -> ApiResult<Json<Store>> {
    Ok(Json(state.commerce.update_store(claims.sub, id, patch).await?))
}

async fn store_products(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.commerce.store_products(claims.sub, id).await?))
}

async fn create_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<NewProduct>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.commerce.create_product(claims.sub, input).await?))
}

async fn update_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProductPatch>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.commerce.update_product(claims.sub, id, patch).await?))
}

async fn store_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<StatusQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.commerce.store_orders(claims.sub, q.status).await?))
}

async fn store_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PlacedOrder>> {
    Ok(Json(state.commerce.store_order(claims.sub, id).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdate {
    pub status: OrderStatus,
}

async fn advance_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> ApiResult<Json<StatusChange>> {
    let change = state.commerce.advance_order(claims.sub, id, req.status).await?;
    publish_settlement(&state, &change);
    Ok(Json(change))
}
