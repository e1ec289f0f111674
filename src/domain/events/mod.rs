use crate::domain::entities::{
    InboundMessage, MessageBody, OutboundResponse, Ticket, TicketId, TicketSource, WorkspaceId,
};

/// A messenger update normalised into the canonical shape the dispatcher consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub workspace_id: WorkspaceId,
    pub source: TicketSource,
    pub bot_token: String,
    pub external_chat_id: String,
    pub external_sender_id: String,
    pub external_message_id: String,
    pub body: MessageBody,
    pub created_at: String,
}

/// A ticket event delivered to every live session of a workspace.
#[derive(Debug, Clone)]
pub enum FanoutEvent {
    Inbound {
        workspace_id: WorkspaceId,
        chat_id: String,
        message: InboundMessage,
    },
    Outbound {
        workspace_id: WorkspaceId,
        chat_id: String,
        message: OutboundResponse,
    },
    /// Assignment, status or tags changed.
    Updated { ticket: Ticket },
}

impl FanoutEvent {
    pub fn workspace_id(&self) -> &str {
        match self {
            FanoutEvent::Inbound { workspace_id, .. } | FanoutEvent::Outbound { workspace_id, .. } => {
                workspace_id
            }
            FanoutEvent::Updated { ticket } => &ticket.workspace_id,
        }
    }

    pub fn ticket_id(&self) -> &TicketId {
        match self {
            FanoutEvent::Inbound { message, .. } => &message.ticket_id,
            FanoutEvent::Outbound { message, .. } => &message.ticket_id,
            FanoutEvent::Updated { ticket } => &ticket.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FanoutEvent::Inbound { .. } => "inbound",
            FanoutEvent::Outbound { .. } => "outbound",
            FanoutEvent::Updated { .. } => "updated",
        }
    }
}

/// An agent reply received on a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMessage {
    pub ticket_id: TicketId,
    pub chat_id: String,
    /// Optional on the wire; when present it must match the ticket's source.
    pub source: Option<TicketSource>,
    pub body: MessageBody,
}
