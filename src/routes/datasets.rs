use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use crate::context::stats::{calculate_correlation, calculate_statistics};
use crate::datasets::parse_content;
use crate::models::{
    ColumnReport, DatasetStatsRequest, DatasetStatsResponse, ParseDatasetRequest, ParseDatasetResponse,
};

pub fn router() -> Router {
    Router::new()
        .route("/api/workbench/datasets/parse", post(parse_dataset))
        .route("/api/workbench/datasets/stats", post(dataset_stats))
}

async fn parse_dataset(Json(request): Json<ParseDatasetRequest>) -> Response {
    if let Err(e) = request.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid dataset upload", "details": e.to_string() })),
        )
            .into_response();
    }

    let parsed = parse_content(&request.filename, &request.content);
    if parsed.has_errors() {
        warn!(filename = %request.filename, errors = parsed.errors.len(), "Dataset failed to parse");
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "Failed to parse dataset",
                "errors": parsed.errors,
                "warnings": parsed.warnings
            })),
        )
            .into_response();
    }

    let warnings = parsed.warnings.clone();
    let dataset = parsed.into_dataset(request.filename);
    info!(
        dataset = %dataset.name,
        format = %dataset.format,
        records = dataset.records.len(),
        "Dataset parsed"
    );

    (StatusCode::OK, Json(ParseDatasetResponse { dataset, warnings })).into_response()
}

async fn dataset_stats(Json(request): Json<DatasetStatsRequest>) -> Response {
    if let Err(e) = request.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid statistics request", "details": e.to_string() })),
        )
            .into_response();
    }

    let records = &request.dataset.records;
    let columns: Vec<ColumnReport> = request
        .columns
        .iter()
        .map(|column| ColumnReport {
            column: column.clone(),
            statistics: calculate_statistics(records, column),
        })
        .collect();

    let correlation = request
        .correlate
        .as_ref()
        .and_then(|(a, b)| calculate_correlation(records, a, b));

    (
        StatusCode::OK,
        Json(DatasetStatsResponse {
            dataset: request.dataset.name,
            columns,
            correlation,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{body_json, post_json};
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_parse_csv_upload() {
        let body = json!({
            "filename": "grow-trial.csv",
            "content": "moisture,contamination_rate\n60,0.1\n70,0.4\n"
        });
        let response = router()
            .oneshot(post_json("/api/workbench/datasets/parse", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["dataset"]["name"], "grow-trial.csv");
        assert_eq!(json["dataset"]["format"], "csv");
        assert_eq!(json["dataset"]["records"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_parse_returns_warnings_with_dataset() {
        let body = json!({
            "filename": "grow-trial.csv",
            "content": "moisture,moisture,strain\n60,61\n"
        });
        let response = router()
            .oneshot(post_json("/api/workbench/datasets/parse", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let warnings = json["warnings"].as_array().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].as_str().unwrap().contains("moisture_2"));
        assert_eq!(json["dataset"]["records"][0]["data"]["moisture_2"], "61");
        assert_eq!(json["dataset"]["records"][0]["data"]["strain"], "");
    }

    #[tokio::test]
    async fn test_parse_unsupported_format() {
        let body = json!({"filename": "plasmid.gb", "content": "LOCUS x"});
        let response = router()
            .oneshot(post_json("/api/workbench/datasets/parse", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert!(json["errors"][0]["message"].as_str().unwrap().contains("Unsupported format"));
    }

    #[tokio::test]
    async fn test_column_stats_and_correlation() {
        let body = json!({
            "dataset": {
                "id": "ds-1",
                "name": "grow-trial",
                "format": "csv",
                "records": [
                    {"id": "record-0", "data": {"moisture": 60, "contamination_rate": 0.1}},
                    {"id": "record-1", "data": {"moisture": 70, "contamination_rate": 0.3}},
                    {"id": "record-2", "data": {"moisture": 80, "contamination_rate": 0.5}}
                ]
            },
            "columns": ["moisture", "strain"],
            "correlate": ["moisture", "contamination_rate"]
        });
        let response = router()
            .oneshot(post_json("/api/workbench/datasets/stats", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["columns"][0]["statistics"]["mean"], 70.0);
        assert!(json["columns"][1]["statistics"].is_null());
        let r = json["correlation"].as_f64().unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stats_requires_columns() {
        let body = json!({
            "dataset": {"id": "ds-1", "name": "empty", "format": "csv", "records": []},
            "columns": []
        });
        let response = router()
            .oneshot(post_json("/api/workbench/datasets/stats", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
