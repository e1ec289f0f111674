use std::sync::{Arc, Mutex};

use relaydesk::domain::entities::{MessageBody, TicketSource};
use relaydesk::domain::errors::{DomainError, DomainResult};
use relaydesk::domain::events::{FanoutEvent, InboundEvent};
use relaydesk::domain::ports::fanout::FanoutPublisher;
use relaydesk::domain::ports::messenger_channel::{MessengerChannelAdapter, SendReceipt};
use relaydesk::infrastructure::providers::{RetryPolicy, TelegramBotAdapter};
use serde_json::Value;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    #[default]
    Never,
    Transient,
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub bot_token: String,
    pub chat_id: String,
    pub body: MessageBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub bot_token: String,
    pub callback_url: String,
    pub secret_token: String,
}

/// Stands in for the bot platform. Normalisation is the real Telegram one; sends and
/// webhook calls are recorded instead of leaving the process.
pub struct MockMessengerChannel {
    normaliser: TelegramBotAdapter,
    pub sent: Mutex<Vec<SentMessage>>,
    pub registrations: Mutex<Vec<Registration>>,
    pub deregistrations: Mutex<Vec<String>>,
    fail_mode: Mutex<FailMode>,
    on_send: Mutex<Option<SendHook>>,
}

/// Runs inside `send`, after the platform has accepted the message.
pub type SendHook = Arc<dyn Fn() + Send + Sync>;

impl MockMessengerChannel {
    pub fn new() -> Self {
        Self {
            normaliser: TelegramBotAdapter::new("http://127.0.0.1:9", RetryPolicy::default())
                .expect("Failed to build normaliser"),
            sent: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            deregistrations: Mutex::new(Vec::new()),
            fail_mode: Mutex::new(FailMode::Never),
            on_send: Mutex::new(None),
        }
    }

    pub fn fail_sends(&self, mode: FailMode) {
        *self.fail_mode.lock().unwrap() = mode;
    }

    pub fn on_send(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_send.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn deregistrations(&self) -> Vec<String> {
        self.deregistrations.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MessengerChannelAdapter for MockMessengerChannel {
    fn source(&self) -> TicketSource {
        TicketSource::TelegramBot
    }

    async fn register_webhook(
        &self,
        bot_token: &str,
        callback_url: &str,
        secret_token: &str,
    ) -> DomainResult<()> {
        self.registrations.lock().unwrap().push(Registration {
            bot_token: bot_token.to_string(),
            callback_url: callback_url.to_string(),
            secret_token: secret_token.to_string(),
        });
        Ok(())
    }

    async fn deregister_webhook(&self, bot_token: &str) -> DomainResult<()> {
        self.deregistrations
            .lock()
            .unwrap()
            .push(bot_token.to_string());
        Ok(())
    }

    fn normalise(
        &self,
        workspace_id: &str,
        bot_token: &str,
        raw: &Value,
    ) -> DomainResult<Option<InboundEvent>> {
        self.normaliser.normalise(workspace_id, bot_token, raw)
    }

    async fn send(
        &self,
        bot_token: &str,
        chat_id: &str,
        body: &MessageBody,
        _deadline: Instant,
    ) -> DomainResult<SendReceipt> {
        match *self.fail_mode.lock().unwrap() {
            FailMode::Transient => {
                return Err(DomainError::UpstreamTransient(
                    "Bot API returned 502".to_string(),
                ))
            }
            FailMode::Permanent => {
                return Err(DomainError::UpstreamPermanent(
                    "Bad Request: chat not found".to_string(),
                ))
            }
            FailMode::Never => {}
        }

        let delivered = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(SentMessage {
                bot_token: bot_token.to_string(),
                chat_id: chat_id.to_string(),
                body: body.clone(),
            });
            sent.len()
        };

        let hook = self.on_send.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(SendReceipt {
            external_message_id: Some(delivered.to_string()),
        })
    }
}

/// Records every published event, then forwards it.
pub struct RecordingPublisher {
    pub events: Mutex<Vec<FanoutEvent>>,
    inner: Option<Arc<dyn FanoutPublisher>>,
}

impl RecordingPublisher {
    pub fn forwarding_to(inner: Arc<dyn FanoutPublisher>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            inner: Some(inner),
        }
    }

    pub fn events(&self) -> Vec<FanoutEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl FanoutPublisher for RecordingPublisher {
    fn publish(&self, event: FanoutEvent) {
        // Held across the forward so the log order is the delivery order.
        let mut events = self.events.lock().unwrap();
        events.push(event.clone());
        if let Some(inner) = &self.inner {
            inner.publish(event);
        }
    }
}
