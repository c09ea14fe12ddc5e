use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use infrastructure::TaskRepository;
use shared::AppError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub mod error;
pub mod handlers;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn TaskRepository>,
}

impl AppState {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self { repo }
    }
}

/// `/api/health` と `/api/task-stats` を持つルーター
pub fn build_router(state: AppState, cors_origin: &str) -> Result<Router, AppError> {
    let origin = cors_origin.parse::<HeaderValue>().map_err(|_| {
        AppError::Configuration(format!("Invalid CORS origin: {cors_origin:?}"))
    })?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS]);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "http_request",
            request_id = %Uuid::new_v4(),
            method = %request.method(),
            path = %request.uri().path(),
        )
    });

    Ok(Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/task-stats", get(handlers::task_stats))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(cors)
        .layer(trace))
}
