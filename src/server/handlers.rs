use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::core::error::CostError;
use crate::core::formatter;
use crate::server::AppState;

/// Response body for a committed ingestion.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub custo_semanal_acumulado: f64,
}

/// Error body for a rejected ingestion.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

fn error_response(status: StatusCode, detail: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            status: "error",
            detail,
        }),
    )
        .into_response()
}

/// POST /api/atualizar-custos
pub async fn post_costs(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            tracing::warn!("rejected request body: {rejection}");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };
    let service = state.service.clone();
    let result = tokio::task::spawn_blocking(move || service.receive_payload(payload)).await;

    match result {
        Ok(Ok(snapshot)) => (
            StatusCode::OK,
            Json(IngestResponse {
                status: "success",
                timestamp: state.service.clock().now().to_rfc3339(),
                custo_semanal_acumulado: snapshot.weekly_total,
            }),
        )
            .into_response(),
        Ok(Err(e @ CostError::InvalidSample(_))) => {
            tracing::warn!("rejected sample: {e}");
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Ok(Err(e)) if e.is_unavailable() => {
            tracing::error!("ingestion failed: {e}");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Ok(Err(e)) => {
            tracing::error!("ingestion failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(join) => {
            tracing::error!("ingestion task panicked: {join}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error while applying sample".to_string(),
            )
        }
    }
}

/// GET /api/custos/
///
/// Always answers with the dashboard shape. A broken store is reported with
/// 503 and the "unavailable" sentinel so the dashboard can tell it apart from
/// "nothing collected yet".
pub async fn get_costs(State(state): State<AppState>) -> Response {
    let service = state.service.clone();
    let result = tokio::task::spawn_blocking(move || service.query()).await;
    let now = state.service.clock().now();

    match result {
        Ok(Ok(formatted)) => (StatusCode::OK, Json(formatted)).into_response(),
        Ok(Err(e)) => {
            tracing::error!("snapshot read failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, Json(formatter::unavailable(now))).into_response()
        }
        Err(join) => {
            tracing::error!("snapshot task panicked: {join}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(formatter::unavailable(now))).into_response()
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
