use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_core::{Address, AddressInput, Notification};

use crate::error::{ApiResult, AppError};
use crate::middleware::auth::{require_user, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/addresses", get(list_addresses).post(create_address))
        .route("/v1/addresses/{id}", put(update_address).delete(delete_address))
        .route("/v1/notifications", get(list_notifications))
        .route("/v1/notifications/read", post(mark_all_read))
        .route("/v1/notifications/{id}/read", post(mark_read))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

// Addresses

async fn own_address(state: &AppState, claims: &Claims, id: Uuid) -> ApiResult<Address> {
    match state.accounts.get_address(id).await? {
        Some(address) if address.user_id == claims.sub => Ok(address),
        _ => Err(AppError::NotFound(format!("address {}", id))),
    }
}

async fn list_addresses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Address>>> {
    Ok(Json(state.accounts.list_addresses(claims.sub).await?))
}

async fn create_address(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddressInput>,
) -> ApiResult<(StatusCode, Json<Address>)> {
    let address = Address::new(claims.sub, req)?;
    state.accounts.save_address(&address).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

async fn update_address(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddressInput>,
) -> ApiResult<Json<Address>> {
    let mut address = own_address(&state, &claims, id).await?;
    address.apply(req)?;
    state.accounts.save_address(&address).await?;
    Ok(Json(address))
}

async fn delete_address(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    own_address(&state, &claims, id).await?;
    state.accounts.delete_address(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

// Notifications

#[derive(Debug, Deserialize)]
struct NotificationQuery {
    #[serde(default)]
    unread: bool,
}

#[derive(Debug, Serialize)]
struct MarkedRead {
    updated: u64,
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(state.accounts.list_notifications(claims.sub, q.unread).await?))
}

async fn mark_all_read(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<MarkedRead>> {
    let updated = state.accounts.mark_notifications_read(claims.sub, None).await?;
    Ok(Json(MarkedRead { updated }))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MarkedRead>> {
    let updated = state.accounts.mark_notifications_read(claims.sub, Some(id)).await?;
    Ok(Json(MarkedRead { updated }))
}
