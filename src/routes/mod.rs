//! API Routes
//!
//! HTTP surface of the workbench backend:
//! - `/api/workbench/hypotheses/{id}/test` - Run the three-agent hypothesis test
//! - `/api/workbench/datasets/parse` - Parse an uploaded file into a dataset
//! - `/api/workbench/datasets/stats` - Column statistics and correlation
//! - `/api/health` - Health checks

pub mod datasets;
pub mod health;
pub mod hypotheses;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let allowed_origins = state.config.server.cors_allowed_origins.clone();

    let router = Router::new()
        .merge(hypotheses::router(state.clone()))
        .merge(datasets::router())
        .merge(health::router(state));

    apply_cors(router, &allowed_origins).layer(TraceLayer::new_for_http())
}
