use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade}, Path, State,
    },
    response::{IntoResponse, Response},
};

use crate::infrastructure::http::middleware::{ApiResult, AppState, AuthenticatedUser};
use crate::infrastructure::realtime::run_session;

/// GET /messenger/ws/:workspace_id - Agent session upgrade
///
/// Membership is checked before the upgrade request itself is looked at, so a denied caller
/// never reaches the session hub.
pub async fn open_session(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path(workspace_id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    state
        .session_service
        .admit(&workspace_id, &auth_user.user_id)
        .await?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let sessions = state.session_service.clone();
    let dispatcher = state.dispatcher.clone();
    let frame_timeout = state.config.session_frame_timeout();

    Ok(ws.on_upgrade(move |socket| async move {
        // Membership may have changed since the upgrade was accepted.
        let session = match sessions.open(&workspace_id, &auth_user.user_id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(
                    "Session for {} in {} refused after upgrade: {}",
                    auth_user.user_id,
                    workspace_id,
                    e
                );
                return;
            }
        };
        run_session(socket, session, sessions, dispatcher, frame_timeout).await;
    }))
}
