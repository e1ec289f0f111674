use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::services::WorkspaceDirectory;
use crate::domain::entities::{
    NewInboundMessage, NewOutboundResponse, NewTicket, OutboundResponse, ReassignToMemberRequest,
    ReassignToTeamRequest, Ticket, TicketSource, TicketStatus, TicketThread, UpdateStatusRequest,
    UpdateTagsRequest, UserId, Workspace,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::{AgentMessage, FanoutEvent, InboundEvent};
use crate::domain::ports::fanout::FanoutPublisher;
use crate::domain::ports::ticket_repository::TicketRepository;
use crate::domain::services::assignment_policy::{available_candidates, pick_least_loaded};
use crate::domain::services::state_machine::on_inbound;
use crate::domain::services::{authorize, validate_transition, Action, Transition};
use crate::infrastructure::providers::ChannelRegistry;

/// What the dispatcher did with an inbound update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Nothing in the update was worth a ticket.
    Discarded,
    /// The external message id was already recorded on the open ticket.
    Duplicate { ticket_id: String },
    Appended { ticket_id: String },
    Created { ticket_id: String },
}

/// Per-chat async locks. Holding one across append + publish keeps fan-out for a chat in
/// append order.
#[derive(Default)]
struct ChatLocks {
    locks: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl ChatLocks {
    fn lock_for(&self, workspace_id: &str, source: TicketSource, chat_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let key = format!("{}\u{1f}{}\u{1f}{}", workspace_id, source, chat_id);
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(lock) = locks.get(&key).and_then(Weak::upgrade) {
            return lock;
        }

        if locks.len() >= 1024 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(key, Arc::downgrade(&lock));
        lock
    }
}

/// Drives tickets through their lifecycle for both planes: inbound messenger traffic and
/// agent actions.
pub struct Dispatcher {
    directory: WorkspaceDirectory,
    ticket_repo: Arc<dyn TicketRepository>,
    channels: ChannelRegistry,
    fanout: Arc<dyn FanoutPublisher>,
    send_timeout: Duration,
    chat_locks: ChatLocks,
}

impl Dispatcher {
    pub fn new(
        directory: WorkspaceDirectory,
        ticket_repo: Arc<dyn TicketRepository>,
        channels: ChannelRegistry,
        fanout: Arc<dyn FanoutPublisher>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            ticket_repo,
            channels,
            fanout,
            send_timeout,
            chat_locks: ChatLocks::default(),
        }
    }

    /// Webhook entry point: resolves the bot's workspace, normalises the update and files it.
    pub async fn handle_inbound(
        &self,
        source: TicketSource,
        bot_token: &str,
        raw: &serde_json::Value,
    ) -> DomainResult<InboundOutcome> {
        let (workspace, integration) = self.directory.integration_by_bot_token(bot_token).await?;
        if integration.source != source {
            return Err(DomainError::NotFound(format!(
                "No active {} integration for bot",
                source
            )));
        }

        let adapter = self.channels.adapter(source)?;
        let Some(event) = adapter.normalise(&workspace.id, bot_token, raw)? else {
            metrics::counter!("relaydesk_inbound_discarded_total").increment(1);
            debug!("Discarded update without content for workspace {}", workspace.id);
            return Ok(InboundOutcome::Discarded);
        };

        metrics::counter!("relaydesk_inbound_events_total", "source" => source.as_str())
            .increment(1);
        self.ingest(&workspace, event).await
    }

    /// Files a normalised event on the chat's open ticket, opening a new one if needed.
    pub async fn ingest(&self, workspace: &Workspace, event: InboundEvent) -> DomainResult<InboundOutcome> {
        let lock = self
            .chat_locks
            .lock_for(&workspace.id, event.source, &event.external_chat_id);
        let _guard = lock.lock().await;

        debug!(
            "Update {} from chat {} sent at {}",
            event.external_message_id, event.external_chat_id, event.created_at
        );
        let message = NewInboundMessage {
            body: event.body.clone(),
            external_message_id: event.external_message_id.clone(),
        };

        // A second pass covers losing a race to another writer for the same chat.
        for _ in 0..2 {
            if let Some(ticket) = self
                .ticket_repo
                .find_open_ticket(&workspace.id, event.source, &event.external_chat_id)
                .await?
            {
                match self.ticket_repo.append_inbound(&ticket.id, &message).await {
                    Ok(Some(appended)) => {
                        self.fanout.publish(FanoutEvent::Inbound {
                            workspace_id: workspace.id.clone(),
                            chat_id: event.external_chat_id.clone(),
                            message: appended,
                        });
                        self.reopen_if_pending(&ticket).await?;
                        return Ok(InboundOutcome::Appended {
                            ticket_id: ticket.id,
                        });
                    }
                    Ok(None) => {
                        debug!(
                            "Message {} already recorded on ticket {}",
                            event.external_message_id, ticket.id
                        );
                        return Ok(InboundOutcome::Duplicate {
                            ticket_id: ticket.id,
                        });
                    }
                    // Closed underneath us; the next pass opens a fresh ticket.
                    Err(DomainError::Conflict(_)) => continue,
                    Err(e) => return Err(e),
                }
            }

            let assigned_to = self
                .pick_assignee(workspace, workspace.default_team.as_deref())
                .await?;
            let new_ticket = NewTicket {
                workspace_id: workspace.id.clone(),
                source: event.source,
                bot_token: event.bot_token.clone(),
                external_chat_id: event.external_chat_id.clone(),
                external_sender_id: event.external_sender_id.clone(),
                assigned_to,
                first_message: message.clone(),
            };

            match self.ticket_repo.create_ticket(&new_ticket).await {
                Ok((ticket, first)) => {
                    metrics::counter!("relaydesk_tickets_created_total").increment(1);
                    info!(
                        "Ticket {} opened for chat {} in workspace {} (assigned to {})",
                        ticket.id,
                        ticket.external_chat_id,
                        workspace.id,
                        ticket.assigned_to.as_deref().unwrap_or("nobody")
                    );
                    self.fanout.publish(FanoutEvent::Inbound {
                        workspace_id: workspace.id.clone(),
                        chat_id: ticket.external_chat_id.clone(),
                        message: first,
                    });
                    return Ok(InboundOutcome::Created {
                        ticket_id: ticket.id,
                    });
                }
                Err(DomainError::Conflict(reason)) => {
                    debug!("Ticket creation raced: {}", reason);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(DomainError::UpstreamTransient(format!(
            "Could not settle a ticket for chat {}",
            event.external_chat_id
        )))
    }

    async fn reopen_if_pending(&self, ticket: &Ticket) -> DomainResult<()> {
        let Transition::Move { from, to } = on_inbound(ticket.status)? else {
            return Ok(());
        };

        match self.ticket_repo.set_status(&ticket.id, from, to).await {
            Ok(updated) => {
                info!("Ticket {} reopened by customer reply", ticket.id);
                self.fanout.publish(FanoutEvent::Updated { ticket: updated });
                Ok(())
            }
            // An agent changed the status concurrently; theirs stands.
            Err(DomainError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn pick_assignee(
        &self,
        workspace: &Workspace,
        team: Option<&str>,
    ) -> DomainResult<Option<UserId>> {
        let Some(team) = team else {
            return Ok(None);
        };

        let candidates = available_candidates(workspace, team);
        if candidates.is_empty() {
            return Ok(None);
        }

        let loads = self
            .ticket_repo
            .count_active_by_assignee(&workspace.id, &candidates)
            .await?;
        Ok(pick_least_loaded(&candidates, &loads))
    }

    /// Loads a ticket and checks it belongs to `workspace_id`.
    async fn ticket_in(&self, workspace_id: &str, ticket_id: &str) -> DomainResult<Ticket> {
        self.ticket_repo
            .get_ticket(ticket_id)
            .await?
            .filter(|t| t.workspace_id == workspace_id)
            .ok_or_else(|| DomainError::NotFound(format!("Ticket {} not found", ticket_id)))
    }

    /// Session entry point: delivers an agent reply and records it once delivered.
    pub async fn send_agent_message(
        &self,
        workspace_id: &str,
        user_id: &str,
        message: AgentMessage,
    ) -> DomainResult<OutboundResponse> {
        let deadline = Instant::now() + self.send_timeout;

        let workspace = self.directory.resolve(workspace_id).await?;
        let ticket = self.ticket_in(workspace_id, &message.ticket_id).await?;
        authorize(&workspace, user_id, Action::SendMessage { ticket: &ticket })?;

        if ticket.is_closed() {
            return Err(DomainError::Conflict(format!(
                "Ticket {} is closed",
                ticket.id
            )));
        }
        if ticket.external_chat_id != message.chat_id {
            return Err(DomainError::ValidationError(format!(
                "Chat {} does not belong to ticket {}",
                message.chat_id, ticket.id
            )));
        }
        if message.source.is_some_and(|s| s != ticket.source) {
            return Err(DomainError::ValidationError(format!(
                "Ticket {} is a {} conversation",
                ticket.id, ticket.source
            )));
        }
        message
            .body
            .validate()
            .map_err(DomainError::ValidationError)?;

        let adapter = self.channels.adapter(ticket.source)?;
        let receipt = match adapter
            .send(&ticket.bot_token, &ticket.external_chat_id, &message.body, deadline)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                metrics::counter!("relaydesk_outbound_failed_total").increment(1);
                warn!("Reply on ticket {} by {} not delivered: {}", ticket.id, user_id, e);
                return Err(e);
            }
        };
        metrics::counter!("relaydesk_outbound_sent_total").increment(1);

        let lock = self
            .chat_locks
            .lock_for(workspace_id, ticket.source, &ticket.external_chat_id);
        let _guard = lock.lock().await;

        let response = self
            .ticket_repo
            .append_outbound(
                &ticket.id,
                &NewOutboundResponse {
                    body: message.body,
                    sender_id: user_id.to_string(),
                },
            )
            .await?;

        debug!(
            "Reply {} on ticket {} delivered (external id {:?})",
            response.id, ticket.id, receipt.external_message_id
        );
        self.fanout.publish(FanoutEvent::Outbound {
            workspace_id: workspace_id.to_string(),
            chat_id: ticket.external_chat_id.clone(),
            message: response.clone(),
        });
        Ok(response)
    }

    pub async fn reassign_to_member(
        &self,
        caller_id: &str,
        request: ReassignToMemberRequest,
    ) -> DomainResult<Ticket> {
        let workspace = self.directory.resolve(&request.workspace_id).await?;
        let ticket = self.ticket_in(&workspace.id, &request.ticket_id).await?;
        let target = request.user_id.as_deref();

        authorize(
            &workspace,
            caller_id,
            Action::ReassignToMember {
                ticket: &ticket,
                target,
            },
        )?;
        if let Some(target) = target {
            if !workspace.is_member(target) {
                return Err(DomainError::ValidationError(format!(
                    "User {} is not a member of workspace {}",
                    target, workspace.id
                )));
            }
        }

        self.apply_assignment(&ticket, target, caller_id).await
    }

    pub async fn reassign_to_team(
        &self,
        caller_id: &str,
        request: ReassignToTeamRequest,
    ) -> DomainResult<Ticket> {
        let workspace = self.directory.resolve(&request.workspace_id).await?;
        let ticket = self.ticket_in(&workspace.id, &request.ticket_id).await?;

        authorize(
            &workspace,
            caller_id,
            Action::ReassignToTeam {
                ticket: &ticket,
                team: &request.team,
            },
        )?;
        if !workspace.teams.contains_key(&request.team) {
            return Err(DomainError::NotFound(format!(
                "Team {} not found in workspace {}",
                request.team, workspace.id
            )));
        }

        let assignee = self.pick_assignee(&workspace, Some(&request.team)).await?;
        self.apply_assignment(&ticket, assignee.as_deref(), caller_id)
            .await
    }

    async fn apply_assignment(
        &self,
        ticket: &Ticket,
        assignee: Option<&str>,
        caller_id: &str,
    ) -> DomainResult<Ticket> {
        if ticket.is_closed() {
            return Err(DomainError::Conflict(format!(
                "Ticket {} is closed",
                ticket.id
            )));
        }

        let lock = self
            .chat_locks
            .lock_for(&ticket.workspace_id, ticket.source, &ticket.external_chat_id);
        let _guard = lock.lock().await;

        let updated = self.ticket_repo.reassign(&ticket.id, assignee).await?;
        info!(
            "Ticket {} assigned to {} by {}",
            updated.id,
            updated.assigned_to.as_deref().unwrap_or("nobody"),
            caller_id
        );
        self.fanout.publish(FanoutEvent::Updated {
            ticket: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn change_status(
        &self,
        caller_id: &str,
        request: UpdateStatusRequest,
    ) -> DomainResult<Ticket> {
        let workspace = self.directory.resolve(&request.workspace_id).await?;
        let ticket = self.ticket_in(&workspace.id, &request.ticket_id).await?;

        authorize(
            &workspace,
            caller_id,
            Action::ChangeStatus {
                ticket: &ticket,
                to: request.status,
            },
        )?;

        let Transition::Move { from, to } = validate_transition(ticket.status, request.status)?
        else {
            return Ok(ticket);
        };

        let lock = self
            .chat_locks
            .lock_for(&ticket.workspace_id, ticket.source, &ticket.external_chat_id);
        let _guard = lock.lock().await;

        let updated = self.ticket_repo.set_status(&ticket.id, from, to).await?;
        info!(
            "Ticket {} moved {} -> {} by {}",
            updated.id, from, to, caller_id
        );
        self.fanout.publish(FanoutEvent::Updated {
            ticket: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn set_tags(&self, caller_id: &str, request: UpdateTagsRequest) -> DomainResult<Ticket> {
        let tags = request
            .normalized_tags()
            .map_err(DomainError::ValidationError)?;
        let workspace = self.directory.resolve(&request.workspace_id).await?;
        let ticket = self.ticket_in(&workspace.id, &request.ticket_id).await?;
        authorize(&workspace, caller_id, Action::EditTags)?;

        let lock = self
            .chat_locks
            .lock_for(&ticket.workspace_id, ticket.source, &ticket.external_chat_id);
        let _guard = lock.lock().await;

        let updated = self.ticket_repo.set_tags(&ticket.id, &tags).await?;
        self.fanout.publish(FanoutEvent::Updated {
            ticket: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn list_tickets(
        &self,
        caller_id: &str,
        workspace_id: &str,
        status: Option<TicketStatus>,
        limit: i64,
        offset: i64,
    ) -> DomainResult<Vec<Ticket>> {
        self.directory
            .authorize(workspace_id, caller_id, Action::ViewTickets)
            .await?;
        self.ticket_repo
            .list_tickets(workspace_id, status, limit.clamp(1, 200), offset.max(0))
            .await
    }

    pub async fn get_thread(
        &self,
        caller_id: &str,
        workspace_id: &str,
        ticket_id: &str,
    ) -> DomainResult<TicketThread> {
        self.directory
            .authorize(workspace_id, caller_id, Action::ViewTickets)
            .await?;
        self.ticket_repo
            .get_thread(ticket_id)
            .await?
            .filter(|thread| thread.ticket.workspace_id == workspace_id)
            .ok_or_else(|| DomainError::NotFound(format!("Ticket {} not found", ticket_id)))
    }
}
