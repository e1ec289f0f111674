use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::application::services::InboundOutcome;
use crate::domain::entities::TicketSource;
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};
use crate::infrastructure::providers::webhook_secret::{verify_secret_token, SECRET_TOKEN_HEADER};

/// POST /integrations/:source/bots/webhook/:bot_token - Messenger update delivery
///
/// 200 acknowledges the update (also when it was discarded or already recorded); 5xx asks
/// the platform to deliver it again.
pub async fn receive_update(
    State(state): State<AppState>,
    Path((source, bot_token)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let source: TicketSource = source
        .parse()
        .map_err(|_| ApiError::NotFound(format!("Unknown source '{}'", source)))?;

    let presented = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    match presented {
        Some(token) => {
            if !verify_secret_token(&state.config.webhook_secret, &bot_token, token) {
                return Err(ApiError::Unauthorized(
                    "Invalid webhook secret token".to_string(),
                ));
            }
        }
        None if state.config.webhook_require_secret => {
            return Err(ApiError::Unauthorized(
                "Missing webhook secret token".to_string(),
            ));
        }
        None => {}
    }

    let update: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed update: {}", e)))?;

    // Filing runs on its own task: past the deadline the platform is asked to redeliver, but an
    // update already recorded still reaches the live sessions.
    let dispatcher = state.dispatcher.clone();
    let filing = tokio::spawn(async move {
        dispatcher
            .handle_inbound(source, &bot_token, &update)
            .await
    });

    let outcome = tokio::time::timeout(state.config.webhook_timeout(), filing)
        .await
        .map_err(|_| {
            tracing::warn!("Webhook for {} exceeded its deadline", source);
            ApiError::ServiceUnavailable("Update not processed in time".to_string())
        })?
        .map_err(|e| ApiError::Internal(format!("Update task failed: {}", e)))??;

    let response = match outcome {
        InboundOutcome::Discarded => json!({ "message": "Update ignored" }),
        InboundOutcome::Duplicate { ticket_id } => {
            json!({ "message": "Update already recorded", "ticket_id": ticket_id })
        }
        InboundOutcome::Appended { ticket_id } => {
            json!({ "message": "Message appended", "ticket_id": ticket_id })
        }
        InboundOutcome::Created { ticket_id } => {
            json!({ "message": "Ticket created", "ticket_id": ticket_id })
        }
    };

    Ok(Json(response))
}
