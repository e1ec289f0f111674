use std::collections::HashMap;

use crate::domain::entities::{
    InboundMessage, NewInboundMessage, NewOutboundResponse, NewTicket, OutboundResponse, Ticket,
    TicketSource, TicketStatus, TicketThread, UserId,
};
use crate::domain::errors::DomainResult;

/// Ticket store. Every write is atomic with respect to a single ticket.
#[async_trait::async_trait]
pub trait TicketRepository: Send + Sync {
    /// The non-closed ticket for an external chat, if any.
    async fn find_open_ticket(
        &self,
        workspace_id: &str,
        source: TicketSource,
        external_chat_id: &str,
    ) -> DomainResult<Option<Ticket>>;

    /// Creates an `Open` ticket holding its first inbound message. Returns `Conflict` if a
    /// non-closed ticket already exists for the chat.
    async fn create_ticket(&self, ticket: &NewTicket) -> DomainResult<(Ticket, InboundMessage)>;

    async fn get_ticket(&self, id: &str) -> DomainResult<Option<Ticket>>;

    async fn get_thread(&self, id: &str) -> DomainResult<Option<TicketThread>>;

    async fn list_tickets(
        &self,
        workspace_id: &str,
        status: Option<TicketStatus>,
        limit: i64,
        offset: i64,
    ) -> DomainResult<Vec<Ticket>>;

    /// Appends in store arrival order. Returns `None` when the external message id was
    /// already recorded on the ticket.
    async fn append_inbound(
        &self,
        ticket_id: &str,
        message: &NewInboundMessage,
    ) -> DomainResult<Option<InboundMessage>>;

    async fn append_outbound(
        &self,
        ticket_id: &str,
        response: &NewOutboundResponse,
    ) -> DomainResult<OutboundResponse>;

    async fn reassign(&self, ticket_id: &str, assignee: Option<&str>) -> DomainResult<Ticket>;

    /// Compare-and-set on the current status. Stamps `resolved_at` when entering `Closed`.
    async fn set_status(
        &self,
        ticket_id: &str,
        from: TicketStatus,
        to: TicketStatus,
    ) -> DomainResult<Ticket>;

    async fn set_tags(&self, ticket_id: &str, tags: &[String]) -> DomainResult<Ticket>;

    /// Number of non-closed tickets assigned to each of `user_ids` within a workspace.
    async fn count_active_by_assignee(
        &self,
        workspace_id: &str,
        user_ids: &[UserId],
    ) -> DomainResult<HashMap<UserId, i64>>;
}
