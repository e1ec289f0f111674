use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::application::services::BotCredentialRequest;
use crate::domain::entities::TicketSource;
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState, AuthenticatedUser};

fn parse_source(source: &str) -> ApiResult<TicketSource> {
    source
        .parse()
        .map_err(|_| ApiError::NotFound(format!("Unknown source '{}'", source)))
}

/// POST /integrations/:source/bots - Bind a bot credential to a workspace
pub async fn register_bot(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path(source): Path<String>,
    Json(request): Json<BotCredentialRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let source = parse_source(&source)?;
    let integration = state
        .integration_service
        .register(&auth_user.user_id, source, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Integration registered", "integration": integration })),
    ))
}

/// DELETE /integrations/:source/bots - Deregister a bot credential
pub async fn deregister_bot(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path(source): Path<String>,
    Json(request): Json<BotCredentialRequest>,
) -> ApiResult<Json<Value>> {
    let source = parse_source(&source)?;
    let integration = state
        .integration_service
        .deregister(&auth_user.user_id, source, request)
        .await?;

    Ok(Json(
        json!({ "message": "Integration deregistered", "integration": integration }),
    ))
}
