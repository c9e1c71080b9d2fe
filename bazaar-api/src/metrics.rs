use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use serde_json::json;

use crate::{error::AppError, state::AppState};

pub const DOMAIN_EVENTS_TOTAL: &str = "bazaar_domain_events_total";
pub const HTTP_RESPONSES_TOTAL: &str = "bazaar_http_responses_total";

/// Process-wide counters exposed in the Prometheus text format.
pub struct Metrics {
    registry: Registry,
    events: IntCounterVec,
    responses: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let events = IntCounterVec::new(
            Opts::new(DOMAIN_EVENTS_TOTAL, "Domain events published, by event name"),
            &["event"],
        )?;
        let responses = IntCounterVec::new(
            Opts::new(HTTP_RESPONSES_TOTAL, "HTTP responses, by method and status code"),
            &["method", "status"],
        )?;
        registry.register(Box::new(events.clone()))?;
        registry.register(Box::new(responses.clone()))?;
        Ok(Self { registry, events, responses })
    }

    pub fn record_event(&self, name: &str) {
        self.events.with_label_values(&[name]).inc();
    }

    pub fn event_count(&self, name: &str) -> u64 {
        self.events.with_label_values(&[name]).get()
    }

    fn record_response(&self, method: &str, status: u16) {
        self.responses.with_label_values(&[method, &status.to_string()]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(format!("Metrics encoding failed: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())], body).into_response())
}

pub async fn track_responses(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let response = next.run(req).await;
    state.metrics.record_response(&method, response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_events() {
        let metrics = Metrics::new().unwrap();
        metrics.record_event("order_placed");
        metrics.record_event("order_placed");

        assert_eq!(metrics.event_count("order_placed"), 2);
        let text = metrics.render().unwrap();
        assert!(text.contains(DOMAIN_EVENTS_TOTAL));
        assert!(text.contains("event=\"order_placed\"} 2"));
    }
}
