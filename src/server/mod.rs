//! HTTP surface: the delivery API, the journal API, health, and metrics,
//! all on one axum router with permissive CORS.

pub mod delivery;
pub mod journal;

use crate::config::Config;
use crate::error::Result;
use crate::letters::LetterService;
use crate::metrics;
use crate::storage::Storage;
use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{extract::State, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub letters: Arc<LetterService>,
    pub config: Arc<Config>,
    pub metrics_handle: Option<PrometheusHandle>,
}

async fn health() -> impl IntoResponse {
    metrics::http_request("health");
    Json(serde_json::json!({
        "status": "healthy",
        "service": "routeboard",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        // Delivery API
        .route("/api/auth-login", post(delivery::auth_login))
        .route("/api/today", get(delivery::today))
        .route(
            "/api/route-days",
            get(delivery::route_days_by_date).post(delivery::create_route_day),
        )
        .route("/api/route-days/:id/start", post(delivery::start_route_day))
        .route("/api/route-days/:id/eta", get(delivery::route_day_eta))
        .route("/api/stop-complete", post(delivery::stop_complete))
        .route("/api/stop-note", post(delivery::stop_note))
        .route("/api/stops/reorder", post(delivery::reorder_stops))
        .route("/api/stops/:id/status", patch(delivery::update_stop_status))
        .route("/api/stops/:id/events", get(delivery::stop_events))
        .route(
            "/api/locations",
            get(delivery::list_locations).post(delivery::create_location),
        )
        .route("/api/locations/:id", patch(delivery::update_location))
        .route("/api/drivers", get(delivery::list_drivers))
        .route(
            "/api/notifications",
            get(delivery::list_notifications).post(delivery::create_notification),
        )
        .route("/api/report/daily", get(delivery::daily_report))
        // Journal API
        .route("/api/diary", get(journal::get_diary).post(journal::post_diary))
        .route(
            "/api/phrases",
            get(journal::get_phrases).post(journal::post_phrase),
        )
        .route("/api/phrases/:id", delete(journal::delete_phrase))
        .route("/api/letters/trigger", post(journal::trigger_letters))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on {bind}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
