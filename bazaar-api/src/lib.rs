use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod account;
pub mod admin;
pub mod auth;
pub mod commerce;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod state;
pub mod taxi;
pub mod travel;
pub mod wallet;

pub use state::{AppState, AuthConfig, Repositories};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE]);

    Router::new()
        .merge(metrics::routes())
        .merge(auth::routes(state.clone()))
        .merge(account::routes(state.clone()))
        .merge(travel::routes(state.clone()))
        .merge(taxi::routes(state.clone()))
        .merge(commerce::routes(state.clone()))
        .merge(wallet::routes(state.clone()))
        .merge(admin::routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(state.clone(), metrics::track_responses))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit::rate_limit))
        .with_state(state)
}
