/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "storage": "s3",
///   "rateLimitBackend": "redis"
/// }
/// ```
///
/// Always answers 200; `status` is `degraded` when the database is unreachable.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use phonoplan_shared::db::pool::health_check as database_health_check;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,

    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,

    /// Active storage provider
    pub storage: String,

    /// `redis` or `memory`
    pub rate_limit_backend: String,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database_status = match database_health_check(&state.db).await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            "disconnected"
        }
    };

    let rate_limit_backend = if state.rate_limiter.has_shared_backend() {
        "redis"
    } else {
        "memory"
    };

    Ok(Json(HealthResponse {
        status: if database_status == "connected" {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: phonoplan_shared::VERSION.to_string(),
        database: database_status.to_string(),
        storage: state.storage.name().to_string(),
        rate_limit_backend: rate_limit_backend.to_string(),
    }))
}
