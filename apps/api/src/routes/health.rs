use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Exoplanet Research Platform API",
        "version": env!("CARGO_PKG_VERSION"),
        "api": "/api/v1"
    }))
}

/// GET /health
/// Reports service version and whether a classifier artifact is loaded.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "exoplanet-api",
        "model_loaded": state.classifier.is_ready(),
        "model_version": state.classifier.model_version()
    }))
}
