use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use bazaar_store::redis_repo::rate_limit_key;

use crate::state::AppState;

/// Per-client fixed window in Redis. Without Redis, or when Redis errors,
/// requests pass.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match redis
        .check_rate_limit(&rate_limit_key(&client), state.rate_limit_per_minute, 60)
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Rate limit exceeded" })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Rate limiter unavailable, allowing request");
            next.run(req).await
        }
    }
}
