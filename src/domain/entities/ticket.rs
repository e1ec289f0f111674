use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{UserId, WorkspaceId};

pub type TicketId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Pending,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Pending => "pending",
            TicketStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(TicketStatus::Open),
            "pending" => Ok(TicketStatus::Pending),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(format!("Unknown ticket status: {}", other)),
        }
    }
}

/// External messenger channel a ticket originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketSource {
    #[serde(rename = "telegramBot")]
    TelegramBot,
    #[serde(rename = "telegram")]
    Telegram,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    #[serde(rename = "instagram")]
    Instagram,
    #[serde(rename = "meta")]
    Meta,
}

impl TicketSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketSource::TelegramBot => "telegramBot",
            TicketSource::Telegram => "telegram",
            TicketSource::WhatsApp => "whatsapp",
            TicketSource::Instagram => "instagram",
            TicketSource::Meta => "meta",
        }
    }

    /// Lowercase form used in URL paths, e.g. `/integrations/telegrambot/bots`.
    pub fn path_segment(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for TicketSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "telegrambot" => Ok(TicketSource::TelegramBot),
            "telegram" => Ok(TicketSource::Telegram),
            "whatsapp" => Ok(TicketSource::WhatsApp),
            "instagram" => Ok(TicketSource::Instagram),
            "meta" => Ok(TicketSource::Meta),
            other => Err(format!("Unknown source: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Voice,
    VideoNote,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::Document => "document",
            MessageKind::Sticker => "sticker",
            MessageKind::Voice => "voice",
            MessageKind::VideoNote => "video_note",
        }
    }

    pub fn is_media(&self) -> bool {
        !matches!(self, MessageKind::Text)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageKind::Text),
            "image" | "photo" => Ok(MessageKind::Image),
            "video" => Ok(MessageKind::Video),
            "audio" => Ok(MessageKind::Audio),
            "document" => Ok(MessageKind::Document),
            "sticker" => Ok(MessageKind::Sticker),
            "voice" => Ok(MessageKind::Voice),
            "video_note" | "videonote" => Ok(MessageKind::VideoNote),
            other => Err(format!("Unknown message type: {}", other)),
        }
    }
}

/// Where the bytes of a media message live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "location", content = "id", rename_all = "snake_case")]
pub enum ContentRef {
    /// File identifier assigned by the external channel.
    External(String),
    /// Handle of a blob persisted by this service.
    Blob(String),
}

impl ContentRef {
    pub fn id(&self) -> &str {
        match self {
            ContentRef::External(id) | ContentRef::Blob(id) => id,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            ContentRef::External(_) => "external",
            ContentRef::Blob(_) => "blob",
        }
    }

    pub fn from_parts(kind: &str, id: String) -> Option<Self> {
        match kind {
            "external" => Some(ContentRef::External(id)),
            "blob" => Some(ContentRef::Blob(id)),
            _ => None,
        }
    }
}

/// Typed payload shared by inbound messages and outbound responses.
///
/// Text messages carry `text` and no content reference; media messages carry a
/// content reference and use `text` for the optional caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub kind: MessageKind,
    pub text: Option<String>,
    pub content_ref: Option<ContentRef>,
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            text: Some(text.into()),
            content_ref: None,
        }
    }

    pub fn media(kind: MessageKind, content_ref: ContentRef, caption: Option<String>) -> Self {
        Self {
            kind,
            text: caption,
            content_ref: Some(content_ref),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match (self.kind, &self.text, &self.content_ref) {
            (MessageKind::Text, Some(text), None) if !text.trim().is_empty() => Ok(()),
            (MessageKind::Text, _, _) => {
                Err("Text messages require non-empty text and no content".to_string())
            }
            (_, _, Some(content)) if !content.id().trim().is_empty() => Ok(()),
            (kind, _, _) => Err(format!("{} messages require a content reference", kind)),
        }
    }

    /// The value shown as the frame's `message` field: text, or the file reference.
    pub fn display_value(&self) -> String {
        match (&self.text, &self.content_ref) {
            (_, Some(content)) => content.id().to_string(),
            (Some(text), None) => text.clone(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub ticket_id: TicketId,
    /// Position assigned by the store on arrival.
    pub seq: i64,
    #[serde(flatten)]
    pub body: MessageBody,
    pub external_message_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundResponse {
    pub id: String,
    pub ticket_id: TicketId,
    pub seq: i64,
    #[serde(flatten)]
    pub body: MessageBody,
    pub sender_id: UserId,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInboundMessage {
    pub body: MessageBody,
    pub external_message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboundResponse {
    pub body: MessageBody,
    pub sender_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub workspace_id: WorkspaceId,
    pub source: TicketSource,
    #[serde(skip_serializing, default)]
    pub bot_token: String,
    pub external_chat_id: String,
    pub external_sender_id: String,
    pub status: TicketStatus,
    pub assigned_to: Option<UserId>,
    pub created_at: String,
    pub resolved_at: Option<String>,
    pub updated_at: String,
    pub tags: Vec<String>,
}

impl Ticket {
    pub fn is_closed(&self) -> bool {
        self.status == TicketStatus::Closed
    }

    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assigned_to.as_deref() == Some(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub workspace_id: WorkspaceId,
    pub source: TicketSource,
    pub bot_token: String,
    pub external_chat_id: String,
    pub external_sender_id: String,
    pub assigned_to: Option<UserId>,
    pub first_message: NewInboundMessage,
}

/// A ticket together with both message timelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketThread {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub inbound_messages: Vec<InboundMessage>,
    pub outbound_responses: Vec<OutboundResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReassignToMemberRequest {
    pub workspace_id: WorkspaceId,
    pub ticket_id: TicketId,
    /// `None` clears the assignee.
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReassignToTeamRequest {
    pub workspace_id: WorkspaceId,
    pub ticket_id: TicketId,
    pub team: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub workspace_id: WorkspaceId,
    pub ticket_id: TicketId,
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTagsRequest {
    pub workspace_id: WorkspaceId,
    pub ticket_id: TicketId,
    pub tags: Vec<String>,
}

impl UpdateTagsRequest {
    /// Trimmed, deduplicated, sorted tags.
    pub fn normalized_tags(&self) -> Result<Vec<String>, String> {
        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in &self.tags {
            let tag = tag.trim();
            if tag.is_empty() {
                return Err("Tags must not be empty".to_string());
            }
            if tag.len() > 64 {
                return Err(format!("Tag '{}' exceeds 64 characters", tag));
            }
            tags.push(tag.to_string());
        }
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parses_path_variants() {
        assert_eq!("telegrambot".parse::<TicketSource>(), Ok(TicketSource::TelegramBot));
        assert_eq!("telegramBot".parse::<TicketSource>(), Ok(TicketSource::TelegramBot));
        assert_eq!("telegram_bot".parse::<TicketSource>(), Ok(TicketSource::TelegramBot));
        assert_eq!("WhatsApp".parse::<TicketSource>(), Ok(TicketSource::WhatsApp));
        assert!("fax".parse::<TicketSource>().is_err());
        assert_eq!(TicketSource::TelegramBot.path_segment(), "telegrambot");
    }

    #[test]
    fn test_source_serde_names() {
        let json = serde_json::to_string(&TicketSource::TelegramBot).unwrap();
        assert_eq!(json, "\"telegramBot\"");
        let parsed: TicketSource = serde_json::from_str("\"whatsapp\"").unwrap();
        assert_eq!(parsed, TicketSource::WhatsApp);
    }

    #[test]
    fn test_message_body_validation() {
        assert!(MessageBody::text("hello").validate().is_ok());
        assert!(MessageBody::text("   ").validate().is_err());

        let photo = MessageBody::media(
            MessageKind::Image,
            ContentRef::External("AgAD123".into()),
            Some("look".into()),
        );
        assert!(photo.validate().is_ok());
        assert_eq!(photo.display_value(), "AgAD123");

        let broken = MessageBody {
            kind: MessageKind::Voice,
            text: Some("no file".into()),
            content_ref: None,
        };
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_normalized_tags() {
        let req = UpdateTagsRequest {
            workspace_id: "WS1".into(),
            ticket_id: "T1".into(),
            tags: vec![" vip ".into(), "billing".into(), "vip".into()],
        };
        assert_eq!(req.normalized_tags().unwrap(), vec!["billing", "vip"]);

        let bad = UpdateTagsRequest {
            tags: vec!["".into()],
            ..req
        };
        assert!(bad.normalized_tags().is_err());
    }
}
