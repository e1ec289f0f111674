use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::infrastructure::http::middleware::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.session_service.hub().total_sessions(),
    }))
}
