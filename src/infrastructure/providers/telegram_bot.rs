use std::time::Duration;

use chrono::{SecondsFormat, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::entities::{timestamp, ContentRef, MessageBody, MessageKind, TicketSource};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::InboundEvent;
use crate::domain::ports::messenger_channel::{MessengerChannelAdapter, SendReceipt};
use crate::infrastructure::providers::retry::RetryPolicy;

/// Upper bound for webhook (de)registration including retries.
const REGISTRATION_DEADLINE: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    #[serde(default)]
    date: Option<i64>,
    chat: TelegramChat,
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    photo: Vec<TelegramPhotoSize>,
    #[serde(default)]
    audio: Option<TelegramFile>,
    #[serde(default)]
    document: Option<TelegramFile>,
    #[serde(default)]
    sticker: Option<TelegramFile>,
    #[serde(default)]
    video: Option<TelegramFile>,
    #[serde(default)]
    voice: Option<TelegramFile>,
    #[serde(default)]
    video_note: Option<TelegramFile>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramPhotoSize {
    file_id: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_id: String,
}

impl TelegramMessage {
    /// Text wins; otherwise the first media slot present, in platform priority order.
    fn body(&self) -> Option<MessageBody> {
        if let Some(text) = self.text.as_deref().filter(|t| !t.trim().is_empty()) {
            return Some(MessageBody::text(text));
        }

        let largest_photo = self
            .photo
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
            .map(|p| p.file_id.as_str());

        let slots = [
            (MessageKind::Image, largest_photo),
            (MessageKind::Audio, file_id(&self.audio)),
            (MessageKind::Document, file_id(&self.document)),
            (MessageKind::Sticker, file_id(&self.sticker)),
            (MessageKind::Video, file_id(&self.video)),
            (MessageKind::Voice, file_id(&self.voice)),
            (MessageKind::VideoNote, file_id(&self.video_note)),
        ];

        slots
            .into_iter()
            .find_map(|(kind, id)| id.filter(|id| !id.is_empty()).map(|id| (kind, id)))
            .map(|(kind, id)| {
                MessageBody::media(
                    kind,
                    ContentRef::External(id.to_string()),
                    self.caption.clone().filter(|c| !c.trim().is_empty()),
                )
            })
    }

    fn sent_at(&self) -> String {
        self.date
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
            .unwrap_or_else(timestamp)
    }
}

fn file_id(file: &Option<TelegramFile>) -> Option<&str> {
    file.as_ref().map(|f| f.file_id.as_str())
}

/// Bot API method and file field used to deliver each message kind.
fn send_method(kind: MessageKind) -> (&'static str, &'static str) {
    match kind {
        MessageKind::Text => ("sendMessage", "text"),
        MessageKind::Image => ("sendPhoto", "photo"),
        MessageKind::Video => ("sendVideo", "video"),
        MessageKind::Audio => ("sendAudio", "audio"),
        MessageKind::Document => ("sendDocument", "document"),
        MessageKind::Sticker => ("sendSticker", "sticker"),
        MessageKind::Voice => ("sendVoice", "voice"),
        MessageKind::VideoNote => ("sendVideoNote", "video_note"),
    }
}

/// Messenger adapter for bots on the Telegram Bot API.
pub struct TelegramBotAdapter {
    http_client: Client,
    api_base: String,
    retry: RetryPolicy,
}

impl TelegramBotAdapter {
    pub fn new(api_base: impl Into<String>, retry: RetryPolicy) -> DomainResult<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DomainError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// One Bot API call. Transport failures, 429 and 5xx are transient; other
    /// rejections are permanent.
    async fn call_api(&self, bot_token: &str, method: &str, payload: &Value) -> DomainResult<Value> {
        let url = format!("{}/bot{}/{}", self.api_base, bot_token, method);

        let response = self
            .http_client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                // The URL embeds the bot credential.
                let e = e.without_url();
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    DomainError::UpstreamTransient(format!("Telegram {} failed: {}", method, e))
                } else {
                    DomainError::UpstreamPermanent(format!("Telegram {} failed: {}", method, e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<TelegramResponse>(&body).ok();
        let description = parsed
            .as_ref()
            .and_then(|r| r.description.clone())
            .unwrap_or_else(|| truncate(&body, 200));

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(DomainError::UpstreamTransient(format!(
                "Telegram {} returned {}: {}",
                method, status, description
            )));
        }
        if !status.is_success() {
            return Err(DomainError::UpstreamPermanent(format!(
                "Telegram {} returned {}: {}",
                method, status, description
            )));
        }

        match parsed {
            Some(TelegramResponse { ok: true, result, .. }) => Ok(result.unwrap_or(Value::Null)),
            Some(_) => Err(DomainError::UpstreamPermanent(format!(
                "Telegram {} rejected: {}",
                method, description
            ))),
            None => Err(DomainError::UpstreamTransient(format!(
                "Telegram {} returned an unreadable body",
                method
            ))),
        }
    }

    async fn call_with_retry(
        &self,
        bot_token: &str,
        method: &str,
        payload: &Value,
        deadline: Instant,
    ) -> DomainResult<Value> {
        self.retry
            .run(method, deadline, |attempt| {
                debug!("Telegram {} attempt {}", method, attempt);
                self.call_api(bot_token, method, payload)
            })
            .await
    }
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[async_trait::async_trait]
impl MessengerChannelAdapter for TelegramBotAdapter {
    fn source(&self) -> TicketSource {
        TicketSource::TelegramBot
    }

    async fn register_webhook(
        &self,
        bot_token: &str,
        callback_url: &str,
        secret_token: &str,
    ) -> DomainResult<()> {
        let payload = json!({
            "url": callback_url,
            "secret_token": secret_token,
            "allowed_updates": ["message"],
        });

        self.call_with_retry(
            bot_token,
            "setWebhook",
            &payload,
            Instant::now() + REGISTRATION_DEADLINE,
        )
        .await?;

        info!("Telegram webhook registered");
        Ok(())
    }

    async fn deregister_webhook(&self, bot_token: &str) -> DomainResult<()> {
        let payload = json!({ "drop_pending_updates": false });

        self.call_with_retry(
            bot_token,
            "deleteWebhook",
            &payload,
            Instant::now() + REGISTRATION_DEADLINE,
        )
        .await?;

        info!("Telegram webhook removed");
        Ok(())
    }

    fn normalise(
        &self,
        workspace_id: &str,
        bot_token: &str,
        raw: &Value,
    ) -> DomainResult<Option<InboundEvent>> {
        let update: TelegramUpdate = serde_json::from_value(raw.clone())
            .map_err(|e| DomainError::ValidationError(format!("Malformed Telegram update: {}", e)))?;

        // Edits, callbacks and channel posts are not ticket traffic.
        let Some(message) = update.message else {
            return Ok(None);
        };

        let Some(body) = message.body() else {
            return Ok(None);
        };

        let chat_id = message.chat.id.to_string();
        let sender_id = message
            .from
            .as_ref()
            .map(|u| u.id.to_string())
            .unwrap_or_else(|| chat_id.clone());

        Ok(Some(InboundEvent {
            workspace_id: workspace_id.to_string(),
            source: TicketSource::TelegramBot,
            bot_token: bot_token.to_string(),
            external_chat_id: chat_id,
            external_sender_id: sender_id,
            external_message_id: message.message_id.to_string(),
            created_at: message.sent_at(),
            body,
        }))
    }

    async fn send(
        &self,
        bot_token: &str,
        chat_id: &str,
        body: &MessageBody,
        deadline: Instant,
    ) -> DomainResult<SendReceipt> {
        body.validate().map_err(DomainError::ValidationError)?;

        let (method, field) = send_method(body.kind);
        let mut payload = json!({ "chat_id": chat_id });

        match &body.content_ref {
            None => {
                payload[field] = json!(body.text.as_deref().unwrap_or_default());
            }
            Some(ContentRef::External(file_id)) => {
                payload[field] = json!(file_id);
                if let Some(caption) = body.text.as_deref() {
                    if body.kind != MessageKind::Sticker && body.kind != MessageKind::VideoNote {
                        payload["caption"] = json!(caption);
                    }
                }
            }
            Some(ContentRef::Blob(handle)) => {
                return Err(DomainError::ValidationError(format!(
                    "Stored blob {} cannot be delivered by reference",
                    handle
                )));
            }
        }

        let result = self.call_with_retry(bot_token, method, &payload, deadline).await?;

        let external_message_id = result
            .get("message_id")
            .and_then(Value::as_i64)
            .map(|id| id.to_string());

        debug!("Telegram {} delivered to chat {}", method, chat_id);
        Ok(SendReceipt { external_message_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn adapter(api_base: &str) -> TelegramBotAdapter {
        TelegramBotAdapter::new(
            api_base,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
        )
        .unwrap()
    }

    fn normalise(raw: Value) -> DomainResult<Option<InboundEvent>> {
        adapter("http://unused").normalise("WS1", "BOT-T", &raw)
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[test]
    fn test_text_update() {
        let event = normalise(json!({
            "update_id": 1,
            "message": {"message_id": 42, "chat": {"id": 9001}, "from": {"id": 555}, "text": "hello"}
        }))
        .unwrap()
        .unwrap();

        assert_eq!(event.workspace_id, "WS1");
        assert_eq!(event.source, TicketSource::TelegramBot);
        assert_eq!(event.external_chat_id, "9001");
        assert_eq!(event.external_sender_id, "555");
        assert_eq!(event.external_message_id, "42");
        assert_eq!(event.body, MessageBody::text("hello"));
    }

    #[test]
    fn test_largest_photo_wins_and_caption_is_kept() {
        let event = normalise(json!({
            "message": {
                "message_id": 7,
                "date": 1700000000,
                "chat": {"id": -100},
                "caption": "receipt",
                "photo": [
                    {"file_id": "small", "width": 90, "height": 90},
                    {"file_id": "large", "width": 1280, "height": 960},
                    {"file_id": "medium", "width": 320, "height": 240}
                ],
                "document": {"file_id": "doc"}
            }
        }))
        .unwrap()
        .unwrap();

        assert_eq!(event.body.kind, MessageKind::Image);
        assert_eq!(event.body.content_ref, Some(ContentRef::External("large".into())));
        assert_eq!(event.body.text.as_deref(), Some("receipt"));
        // No sender: the chat stands in for it.
        assert_eq!(event.external_sender_id, "-100");
        assert_eq!(event.created_at, "2023-11-14T22:13:20.000000Z");
    }

    #[test]
    fn test_media_priority_order() {
        let event = normalise(json!({
            "message": {
                "message_id": 8,
                "chat": {"id": 1},
                "voice": {"file_id": "v"},
                "sticker": {"file_id": "s"},
                "video_note": {"file_id": "vn"}
            }
        }))
        .unwrap()
        .unwrap();
        assert_eq!(event.body.kind, MessageKind::Sticker);

        let event = normalise(json!({
            "message": {"message_id": 9, "chat": {"id": 1}, "video_note": {"file_id": "vn"}}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(event.body.kind, MessageKind::VideoNote);
    }

    #[test]
    fn test_updates_without_content_are_discarded() {
        assert!(normalise(json!({
            "message": {"message_id": 10, "chat": {"id": 1}, "new_chat_members": []}
        }))
        .unwrap()
        .is_none());
        assert!(normalise(json!({"update_id": 5, "edited_message": {}}))
            .unwrap()
            .is_none());
        assert!(normalise(json!({
            "message": {"message_id": 11, "chat": {"id": 1}, "text": "   "}
        }))
        .unwrap()
        .is_none());
    }

    #[test]
    fn test_malformed_update_is_rejected() {
        assert!(matches!(
            normalise(json!({"message": {"text": "no chat"}})),
            Err(DomainError::ValidationError(_))
        ));
        assert!(matches!(normalise(json!([1, 2])), Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_send_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botBOT-T/sendMessage")
            .match_body(Matcher::Json(json!({"chat_id": "9001", "text": "hi"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"message_id":77}}"#)
            .expect(1)
            .create_async()
            .await;

        let receipt = adapter(&server.url())
            .send("BOT-T", "9001", &MessageBody::text("hi"), deadline())
            .await
            .unwrap();

        assert_eq!(receipt.external_message_id.as_deref(), Some("77"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_media_with_caption() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botBOT-T/sendDocument")
            .match_body(Matcher::Json(
                json!({"chat_id": "9001", "document": "file-1", "caption": "invoice"}),
            ))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"message_id":78}}"#)
            .create_async()
            .await;

        let body = MessageBody::media(
            MessageKind::Document,
            ContentRef::External("file-1".into()),
            Some("invoice".into()),
        );
        adapter(&server.url())
            .send("BOT-T", "9001", &body, deadline())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_up_to_ceiling() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botBOT-T/sendMessage")
            .with_status(502)
            .with_body("bad gateway")
            .expect(3)
            .create_async()
            .await;

        let err = adapter(&server.url())
            .send("BOT-T", "9001", &MessageBody::text("hi"), deadline())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::UpstreamTransient(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botBOT-T/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .expect(1)
            .create_async()
            .await;

        let err = adapter(&server.url())
            .send("BOT-T", "9001", &MessageBody::text("hi"), deadline())
            .await
            .unwrap_err();

        match err {
            DomainError::UpstreamPermanent(msg) => assert!(msg.contains("chat not found")),
            other => panic!("expected permanent error, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_register_webhook_passes_secret() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botBOT-T/setWebhook")
            .match_body(Matcher::PartialJson(json!({
                "url": "https://desk.example.com/integrations/telegrambot/bots/webhook/BOT-T",
                "secret_token": "abc123"
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":true,"description":"Webhook is already set"}"#)
            .expect(2)
            .create_async()
            .await;

        let adapter = adapter(&server.url());
        let url = "https://desk.example.com/integrations/telegrambot/bots/webhook/BOT-T";
        adapter.register_webhook("BOT-T", url, "abc123").await.unwrap();
        // Re-registering the same URL succeeds.
        adapter.register_webhook("BOT-T", url, "abc123").await.unwrap();
        mock.assert_async().await;
    }
}
