use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    timestamp, ContentRef, MessageBody, MessageKind, TicketSource, TicketStatus, UserId,
};
use crate::domain::events::{AgentMessage, FanoutEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameEvent {
    Inbound,
    Outbound,
    Updated,
    Error,
}

/// Server -> agent frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub event: FrameEvent,
    pub ticket_id: String,
    pub chat_id: String,
    /// Text, or the content reference for media.
    pub message: String,
    /// Base64 of the media reference bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ServerFrame {
    fn message(
        event: FrameEvent,
        ticket_id: &str,
        chat_id: &str,
        body: &MessageBody,
        created_at: &str,
        seq: i64,
    ) -> Self {
        let (content, caption) = match &body.content_ref {
            Some(content_ref) => (
                Some(BASE64.encode(content_ref.id().as_bytes())),
                body.text.clone(),
            ),
            None => (None, None),
        };

        Self {
            event,
            ticket_id: ticket_id.to_string(),
            chat_id: chat_id.to_string(),
            message: body.display_value(),
            content,
            caption,
            kind: body.kind.as_str().to_string(),
            created_at: created_at.to_string(),
            seq: Some(seq),
            sender_id: None,
            status: None,
            assigned_to: None,
            tags: None,
        }
    }

    /// Reported to the originating session only.
    pub fn error(ticket_id: &str, chat_id: &str, message: impl Into<String>) -> Self {
        Self {
            event: FrameEvent::Error,
            ticket_id: ticket_id.to_string(),
            chat_id: chat_id.to_string(),
            message: message.into(),
            content: None,
            caption: None,
            kind: "error".to_string(),
            created_at: timestamp(),
            seq: None,
            sender_id: None,
            status: None,
            assigned_to: None,
            tags: None,
        }
    }

    pub fn to_json(&self) -> String {
        // Plain data; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<&FanoutEvent> for ServerFrame {
    fn from(event: &FanoutEvent) -> Self {
        match event {
            FanoutEvent::Inbound { chat_id, message, .. } => ServerFrame::message(
                FrameEvent::Inbound,
                &message.ticket_id,
                chat_id,
                &message.body,
                &message.created_at,
                message.seq,
            ),
            FanoutEvent::Outbound { chat_id, message, .. } => {
                let mut frame = ServerFrame::message(
                    FrameEvent::Outbound,
                    &message.ticket_id,
                    chat_id,
                    &message.body,
                    &message.created_at,
                    message.seq,
                );
                frame.sender_id = Some(message.sender_id.clone());
                frame
            }
            FanoutEvent::Updated { ticket } => Self {
                event: FrameEvent::Updated,
                ticket_id: ticket.id.clone(),
                chat_id: ticket.external_chat_id.clone(),
                message: ticket.status.as_str().to_string(),
                content: None,
                caption: None,
                kind: "ticket".to_string(),
                created_at: ticket.updated_at.clone(),
                seq: None,
                sender_id: None,
                status: Some(ticket.status),
                assigned_to: ticket.assigned_to.clone(),
                tags: Some(ticket.tags.clone()),
            },
        }
    }
}

/// Agent -> server envelope, as sent on the wire.
#[derive(Debug, Deserialize)]
struct AgentFrame {
    ticket_id: String,
    chat_id: String,
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default = "default_kind")]
    kind: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

fn default_kind() -> String {
    "text".to_string()
}

/// Parses an agent text frame. Anything that is not a well-formed envelope with a known
/// type yields `None` and is ignored by the caller.
pub fn parse_agent_frame(text: &str) -> Option<AgentMessage> {
    let frame: AgentFrame = serde_json::from_str(text).ok()?;
    let kind: MessageKind = frame.kind.parse().ok()?;
    let source = match frame.source.as_deref() {
        Some(raw) => Some(raw.parse::<TicketSource>().ok()?),
        None => None,
    };

    let body = if kind.is_media() {
        MessageBody::media(
            kind,
            ContentRef::External(frame.message),
            frame.caption.filter(|c| !c.trim().is_empty()),
        )
    } else {
        MessageBody::text(frame.message)
    };

    Some(AgentMessage {
        ticket_id: frame.ticket_id,
        chat_id: frame.chat_id,
        source,
        body,
    })
}
