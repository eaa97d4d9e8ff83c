//! Liveness and readiness probes: `/healthz` always reports the process is
//! up, `/readyz` additionally round-trips Redis so a load balancer can pull
//! an instance that's lost its backing store.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

pub async fn healthz() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub kv: CheckStatus,
}

#[derive(Debug, Serialize)]
pub struct CheckStatus {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self { ok: true, error: None }
    }

    fn error(message: String) -> Self {
        Self { ok: false, error: Some(message) }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

pub async fn readyz(State(state): State<AppState>) -> Response {
    let kv_check = match state.kv.get("readyz-probe").await {
        Ok(_) => CheckStatus::ok(),
        Err(e) => CheckStatus::error(e.to_string()),
    };

    let ready = kv_check.ok;
    let status = if ready { "ok" } else { "degraded" };
    let body = ReadinessResponse { status, checks: ReadinessChecks { kv: kv_check } };

    let code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, axum::Json(body)).into_response()
}
