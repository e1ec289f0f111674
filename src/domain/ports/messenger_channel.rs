use tokio::time::Instant;

use crate::domain::entities::{MessageBody, TicketSource};
use crate::domain::errors::DomainResult;
use crate::domain::events::InboundEvent;

/// What the external platform reported back for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SendReceipt {
    pub external_message_id: Option<String>,
}

/// Contract every messenger source implements. Adapters hold no per-conversation state.
#[async_trait::async_trait]
pub trait MessengerChannelAdapter: Send + Sync {
    fn source(&self) -> TicketSource;

    /// Points the platform at `callback_url`. Re-registering the same URL succeeds.
    async fn register_webhook(
        &self,
        bot_token: &str,
        callback_url: &str,
        secret_token: &str,
    ) -> DomainResult<()>;

    async fn deregister_webhook(&self, bot_token: &str) -> DomainResult<()>;

    /// Converts a raw update. `Ok(None)` means the update carries nothing worth a ticket.
    fn normalise(
        &self,
        workspace_id: &str,
        bot_token: &str,
        raw: &serde_json::Value,
    ) -> DomainResult<Option<InboundEvent>>;

    /// Delivers a message, retrying transient failures until `deadline`.
    async fn send(
        &self,
        bot_token: &str,
        chat_id: &str,
        body: &MessageBody,
        deadline: Instant,
    ) -> DomainResult<SendReceipt>;
}
