use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::application::services::{Dispatcher, SessionService};
use crate::domain::entities::OutboundResponse;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::AgentMessage;
use crate::infrastructure::realtime::frames::{parse_agent_frame, ServerFrame};
use crate::infrastructure::realtime::session_hub::Session;

/// Runs one agent reply on its own task.
///
/// Once the messenger has accepted the reply it must be recorded and fanned out, so the work
/// outlives the session that asked for it. Dropping the handle does not cancel it.
pub fn spawn_reply(
    dispatcher: Arc<Dispatcher>,
    workspace_id: String,
    user_id: String,
    message: AgentMessage,
) -> JoinHandle<DomainResult<OutboundResponse>> {
    tokio::spawn(async move {
        dispatcher
            .send_agent_message(&workspace_id, &user_id, message)
            .await
    })
}

/// Pumps one agent session until either side goes away.
///
/// A spawned writer drains the session outbox onto the socket with a per-frame deadline; the
/// calling task reads agent frames and hands them to the dispatcher. Whichever ends first
/// cancels the session, and the hub entry is removed before returning.
pub async fn run_session(
    socket: WebSocket,
    session: Session,
    sessions: SessionService,
    dispatcher: Arc<Dispatcher>,
    frame_timeout: Duration,
) {
    let Session {
        id,
        workspace_id,
        user_id,
        mut outbox,
        cancel,
    } = session;
    let (mut sender, mut receiver) = socket.split();

    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = writer_cancel.cancelled() => break,
                frame = outbox.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            match timeout(frame_timeout, sender.send(Message::Text(frame.to_json()))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("Session {} socket write failed: {}", id, e);
                    break;
                }
                Err(_) => {
                    warn!("Session {} missed the frame write deadline", id);
                    break;
                }
            }
        }
        writer_cancel.cancel();
        let _ = sender.close().await;
    });

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = receiver.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                let Some(agent_message) = parse_agent_frame(&text) else {
                    debug!("Ignoring unrecognised frame on session {}", id);
                    continue;
                };

                let ticket_id = agent_message.ticket_id.clone();
                let chat_id = agent_message.chat_id.clone();
                let reply = spawn_reply(
                    dispatcher.clone(),
                    workspace_id.clone(),
                    user_id.clone(),
                    agent_message,
                );
                let result = reply.await.unwrap_or_else(|e| {
                    Err(DomainError::Internal(format!("Reply task failed: {}", e)))
                });

                if let Err(e) = result {
                    if matches!(e, DomainError::Internal(_)) {
                        tracing::error!(
                            "Reply from {} on ticket {} failed: {}",
                            user_id,
                            ticket_id,
                            e
                        );
                    }
                    sessions.hub().send_to_session(
                        &workspace_id,
                        id,
                        ServerFrame::error(&ticket_id, &chat_id, e.to_string()),
                    );
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            // Pings are answered by the socket layer
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!("Session {} read failed: {}", id, e);
                break;
            }
        }
    }

    sessions.close(&workspace_id, id);
    cancel.cancel();
    let _ = writer.await;
    info!("Session {} of user {} ended", id, user_id);
}
