use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::AppState;

/// GET / - Describe the service and its endpoints
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Field Ops API",
            "version": version,
            "description": "Points ledger, approval workflows and journey op-log sync",
            "endpoints": {
                "health": "/health (public)",
                "bag_lifts": "/bag-lifts[/:id] (protected; PATCH requires approver)",
                "kyc": "/kyc-submissions[/:id] (protected; PATCH requires approver)",
                "redemptions": "/rewards-redemption[/:id] (protected; PATCH requires approver)",
                "masons": "/masons/:id, /masons/:id/ledger, /masons/:id/reconcile (protected)",
                "journey_ops": "/journey-ops, /journey-ops/sync (protected)",
                "journeys": "/journeys/:id, /journeys/rebuild (protected; rebuild requires admin)",
                "ws": "/ws (token via Authorization header or ?token=)",
            }
        }
    }))
}

/// GET /health - Ping the store; 503 when it is unreachable
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
