//! Health and metrics endpoints.
//!
//! - Liveness: `/health`, `/healthz`
//! - Readiness: `/ready`, `/readyz` (broker reachable, registry loaded)
//! - Prometheus metrics: `/metrics`

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use event_bus::Broker;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct HealthState {
    pub broker: Arc<dyn Broker>,
    pub app_name: String,
    pub app_version: String,
    /// Event types with validated rules and templates
    pub registered_events: usize,
}

impl HealthState {
    pub fn new(
        broker: Arc<dyn Broker>,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        registered_events: usize,
    ) -> Self {
        Self {
            broker,
            app_name: app_name.into(),
            app_version: app_version.into(),
            registered_events,
        }
    }
}

/// Health response for liveness probes.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub version: String,
}

pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        name: state.app_name,
        version: state.app_version,
    })
}

/// Ready when the broker answers and the registry has entries.
pub async fn ready_handler(
    State(state): State<HealthState>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let broker_check = match state.broker.health_check().await {
        Ok(()) => Ok("ok".to_string()),
        Err(e) => Err(format!("error: {}", e)),
    };
    let registry_check = if state.registered_events > 0 {
        Ok(format!("{} event types", state.registered_events))
    } else {
        Err("empty".to_string())
    };

    let ready = broker_check.is_ok() && registry_check.is_ok();
    let body = Json(json!({
        "status": if ready { "ready" } else { "not_ready" },
        "checks": {
            "broker": broker_check.unwrap_or_else(|e| e),
            "broker_name": state.broker.name(),
            "registry": registry_check.unwrap_or_else(|e| e),
        }
    }));

    if ready {
        Ok((StatusCode::OK, body))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, body))
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        event_bus::render_metrics(),
    )
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
