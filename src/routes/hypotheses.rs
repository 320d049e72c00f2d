use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::models::{AppState, TestHypothesisRequest};
use crate::types::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/workbench/hypotheses/{id}/test", post(test_hypothesis_handler))
        .with_state(state)
}

async fn test_hypothesis_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TestHypothesisRequest>, JsonRejection>,
) -> Response {
    let mut request = match payload {
        Ok(Json(request)) if !request.hypothesis.statement.trim().is_empty() => request,
        Ok(_) => return invalid_hypothesis(),
        Err(rejection) => {
            warn!(hypothesis_id = %id, error = %rejection, "Rejected hypothesis payload");
            return invalid_hypothesis();
        }
    };

    if request.hypothesis.id.is_none() {
        request.hypothesis.id = Some(id.clone());
    }

    info!(
        hypothesis_id = %id,
        datasets = request.datasets.len(),
        "Hypothesis test requested"
    );

    let pipeline = match &state.pipeline {
        Ok(pipeline) => pipeline.clone(),
        Err(reason) => {
            error!(hypothesis_id = %id, %reason, "Hosted model is not configured");
            return failure(StatusCode::SERVICE_UNAVAILABLE, reason);
        }
    };

    match pipeline.test_hypothesis(request).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(AppError::InvalidRequest(_)) => invalid_hypothesis(),
        Err(e) => {
            error!(hypothesis_id = %id, error = %e, "Hypothesis test failed");
            failure(error_status(&e), &e.to_string())
        }
    }
}

fn failure(status: StatusCode, details: &str) -> Response {
    (
        status,
        Json(json!({
            "error": "Failed to test hypothesis",
            "details": details
        })),
    )
        .into_response()
}

fn invalid_hypothesis() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid hypothesis data" })),
    )
        .into_response()
}

fn error_status(error: &AppError) -> StatusCode {
    match error {
        AppError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        AppError::StageTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
