use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Carebook API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Facility booking payments and subscriptions",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "api": "/api/v1"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
