use crate::domain::entities::{
    timestamp, ContentRef, InboundMessage, MessageBody, NewInboundMessage, NewOutboundResponse,
    NewTicket, OutboundResponse, Ticket, TicketSource, TicketStatus, TicketThread, UserId,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::ticket_repository::TicketRepository;
use crate::infrastructure::persistence::Database;
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::Row;
use std::collections::HashMap;

const TICKET_COLUMNS: &str = "id, workspace_id, source, bot_token, external_chat_id,
     external_sender_id, status, assigned_to, created_at, resolved_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, ticket_id, seq, kind, body, content_ref, content_ref_kind,
     external_message_id, sender_id, created_at";

fn ticket_from_row(row: &AnyRow, tags: Vec<String>) -> DomainResult<Ticket> {
    let source: String = row.try_get("source")?;
    let status: String = row.try_get("status")?;
    Ok(Ticket {
        id: row.try_get("id")?,
        workspace_id: row.try_get("workspace_id")?,
        source: source.parse().map_err(DomainError::Internal)?,
        bot_token: row.try_get("bot_token")?,
        external_chat_id: row.try_get("external_chat_id")?,
        external_sender_id: row.try_get("external_sender_id")?,
        status: status.parse().map_err(DomainError::Internal)?,
        assigned_to: row.try_get("assigned_to")?,
        created_at: row.try_get("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
        updated_at: row.try_get("updated_at")?,
        tags,
    })
}

fn body_from_row(row: &AnyRow) -> DomainResult<MessageBody> {
    let kind: String = row.try_get("kind")?;
    let content_ref: Option<String> = row.try_get("content_ref")?;
    let content_ref_kind: Option<String> = row.try_get("content_ref_kind")?;

    let content_ref = match (content_ref, content_ref_kind) {
        (Some(id), Some(kind)) => Some(ContentRef::from_parts(&kind, id).ok_or_else(|| {
            DomainError::Internal(format!("Unknown content location: {}", kind))
        })?),
        _ => None,
    };

    Ok(MessageBody {
        kind: kind.parse().map_err(DomainError::Internal)?,
        text: row.try_get("body")?,
        content_ref,
    })
}

fn inbound_from_row(row: &AnyRow) -> DomainResult<InboundMessage> {
    Ok(InboundMessage {
        id: row.try_get("id")?,
        ticket_id: row.try_get("ticket_id")?,
        seq: row.try_get("seq")?,
        body: body_from_row(row)?,
        external_message_id: row
            .try_get::<Option<String>, _>("external_message_id")?
            .unwrap_or_default(),
        created_at: row.try_get("created_at")?,
    })
}

fn outbound_from_row(row: &AnyRow) -> DomainResult<OutboundResponse> {
    Ok(OutboundResponse {
        id: row.try_get("id")?,
        ticket_id: row.try_get("ticket_id")?,
        seq: row.try_get("seq")?,
        body: body_from_row(row)?,
        sender_id: row
            .try_get::<Option<String>, _>("sender_id")?
            .unwrap_or_default(),
        created_at: row.try_get("created_at")?,
    })
}

// Appends take the next per-direction seq and a created_at no earlier than the current tail,
// in one statement. Zero rows inserted means the ticket is missing or closed, or (inbound
// only, via OR IGNORE) the external message id was already recorded.
const APPEND_MESSAGE_SQL: &str = "INSERT OR IGNORE INTO ticket_messages
        (id, ticket_id, direction, seq, kind, body, content_ref, content_ref_kind,
         external_message_id, sender_id, created_at)
     SELECT ?, t.id, ?,
            (SELECT COALESCE(MAX(m.seq), 0) + 1 FROM ticket_messages m
              WHERE m.ticket_id = t.id AND m.direction = ?),
            ?, ?, ?, ?, ?, ?,
            MAX(?, COALESCE((SELECT MAX(m.created_at) FROM ticket_messages m
                              WHERE m.ticket_id = t.id AND m.direction = ?), ''))
     FROM tickets t
     WHERE t.id = ? AND t.status <> 'closed'";

struct MessageInsert<'a> {
    ticket_id: &'a str,
    direction: &'static str,
    body: &'a MessageBody,
    external_message_id: Option<&'a str>,
    sender_id: Option<&'a str>,
}

// Internal helpers
impl Database {
    async fn load_tags(&self, ticket_id: &str) -> DomainResult<Vec<String>> {
        let rows = sqlx::query("SELECT tag FROM ticket_tags WHERE ticket_id = ? ORDER BY tag")
            .bind(ticket_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get("tag").map_err(DomainError::from))
            .collect()
    }

    async fn load_tags_for(&self, ticket_ids: &[String]) -> DomainResult<HashMap<String, Vec<String>>> {
        let mut tags: HashMap<String, Vec<String>> = HashMap::new();
        if ticket_ids.is_empty() {
            return Ok(tags);
        }

        let placeholders = vec!["?"; ticket_ids.len()].join(", ");
        let sql = format!(
            "SELECT ticket_id, tag FROM ticket_tags WHERE ticket_id IN ({}) ORDER BY tag",
            placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in ticket_ids {
            query = query.bind(id);
        }

        for row in query.fetch_all(&self.pool).await? {
            tags.entry(row.try_get("ticket_id")?)
                .or_default()
                .push(row.try_get("tag")?);
        }
        Ok(tags)
    }

    async fn require_ticket(&self, ticket_id: &str) -> DomainResult<Ticket> {
        self.get_ticket(ticket_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Ticket {} not found", ticket_id)))
    }

    /// Explains why a conditional write on a ticket touched no rows.
    async fn explain_missed_write(&self, ticket_id: &str) -> DomainError {
        match self.get_ticket(ticket_id).await {
            Ok(None) => DomainError::NotFound(format!("Ticket {} not found", ticket_id)),
            Ok(Some(ticket)) if ticket.is_closed() => {
                DomainError::Conflict(format!("Ticket {} is closed", ticket_id))
            }
            Ok(Some(ticket)) => DomainError::Conflict(format!(
                "Ticket {} changed concurrently (now {})",
                ticket_id, ticket.status
            )),
            Err(e) => e,
        }
    }

    /// Returns the id of the inserted row, or `None` if nothing was inserted.
    async fn insert_message<'e, E>(
        &self,
        executor: E,
        insert: MessageInsert<'_>,
    ) -> DomainResult<Option<String>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Any>,
    {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();

        let result = sqlx::query(APPEND_MESSAGE_SQL)
            .bind(&id)
            .bind(insert.direction)
            .bind(insert.direction)
            .bind(insert.body.kind.as_str())
            .bind(insert.body.text.as_deref())
            .bind(insert.body.content_ref.as_ref().map(|c| c.id()))
            .bind(insert.body.content_ref.as_ref().map(|c| c.kind_str()))
            .bind(insert.external_message_id)
            .bind(insert.sender_id)
            .bind(&now)
            .bind(insert.direction)
            .bind(insert.ticket_id)
            .execute(executor)
            .await?;

        Ok((result.rows_affected() > 0).then_some(id))
    }

    async fn fetch_message(&self, message_id: &str) -> DomainResult<AnyRow> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM ticket_messages WHERE id = ?",
            MESSAGE_COLUMNS
        ))
        .bind(message_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl TicketRepository for Database {
    async fn find_open_ticket(
        &self,
        workspace_id: &str,
        source: TicketSource,
        external_chat_id: &str,
    ) -> DomainResult<Option<Ticket>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tickets
             WHERE workspace_id = ? AND source = ? AND external_chat_id = ? AND status <> 'closed'",
            TICKET_COLUMNS
        ))
        .bind(workspace_id)
        .bind(source.as_str())
        .bind(external_chat_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let id: String = row.try_get("id")?;
                let tags = self.load_tags(&id).await?;
                Ok(Some(ticket_from_row(&row, tags)?))
            }
            None => Ok(None),
        }
    }

    async fn create_ticket(&self, new: &NewTicket) -> DomainResult<(Ticket, InboundMessage)> {
        new.first_message
            .body
            .validate()
            .map_err(DomainError::ValidationError)?;

        let ticket_id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO tickets (id, workspace_id, source, bot_token, external_chat_id,
                                  external_sender_id, status, assigned_to, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 'open', ?, ?, ?)",
        )
        .bind(&ticket_id)
        .bind(&new.workspace_id)
        .bind(new.source.as_str())
        .bind(&new.bot_token)
        .bind(&new.external_chat_id)
        .bind(&new.external_sender_id)
        .bind(&new.assigned_to)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DomainError::from(e) {
            DomainError::Conflict(_) => DomainError::Conflict(format!(
                "Chat {} already has an open ticket",
                new.external_chat_id
            )),
            other => other,
        })?;

        let message_id = self
            .insert_message(
                &mut *tx,
                MessageInsert {
                    ticket_id: &ticket_id,
                    direction: "inbound",
                    body: &new.first_message.body,
                    external_message_id: Some(&new.first_message.external_message_id),
                    sender_id: None,
                },
            )
            .await?
            .ok_or_else(|| DomainError::Internal("First message was not stored".to_string()))?;

        tx.commit().await?;

        let ticket = self.require_ticket(&ticket_id).await?;
        let message = inbound_from_row(&self.fetch_message(&message_id).await?)?;
        Ok((ticket, message))
    }

    async fn get_ticket(&self, id: &str) -> DomainResult<Option<Ticket>> {
        let row = sqlx::query(&format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let tags = self.load_tags(id).await?;
                Ok(Some(ticket_from_row(&row, tags)?))
            }
            None => Ok(None),
        }
    }

    async fn get_thread(&self, id: &str) -> DomainResult<Option<TicketThread>> {
        let Some(ticket) = self.get_ticket(id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(&format!(
            "SELECT {}, direction FROM ticket_messages WHERE ticket_id = ? ORDER BY direction, seq",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut inbound_messages = Vec::new();
        let mut outbound_responses = Vec::new();
        for row in &rows {
            let direction: String = row.try_get("direction")?;
            if direction == "inbound" {
                inbound_messages.push(inbound_from_row(row)?);
            } else {
                outbound_responses.push(outbound_from_row(row)?);
            }
        }

        Ok(Some(TicketThread {
            ticket,
            inbound_messages,
            outbound_responses,
        }))
    }

    async fn list_tickets(
        &self,
        workspace_id: &str,
        status: Option<TicketStatus>,
        limit: i64,
        offset: i64,
    ) -> DomainResult<Vec<Ticket>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM tickets WHERE workspace_id = ? AND status = ?
                     ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
                    TICKET_COLUMNS
                ))
                .bind(workspace_id)
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM tickets WHERE workspace_id = ?
                     ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
                    TICKET_COLUMNS
                ))
                .bind(workspace_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let ids = rows
            .iter()
            .map(|row| row.try_get::<String, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut tags = self.load_tags_for(&ids).await?;

        rows.iter()
            .zip(ids.iter())
            .map(|(row, id)| ticket_from_row(row, tags.remove(id).unwrap_or_default()))
            .collect()
    }

    async fn append_inbound(
        &self,
        ticket_id: &str,
        message: &NewInboundMessage,
    ) -> DomainResult<Option<InboundMessage>> {
        message
            .body
            .validate()
            .map_err(DomainError::ValidationError)?;

        let inserted = self
            .insert_message(
                &self.pool,
                MessageInsert {
                    ticket_id,
                    direction: "inbound",
                    body: &message.body,
                    external_message_id: Some(&message.external_message_id),
                    sender_id: None,
                },
            )
            .await?;

        match inserted {
            Some(id) => Ok(Some(inbound_from_row(&self.fetch_message(&id).await?)?)),
            None => match self.get_ticket(ticket_id).await? {
                None => Err(DomainError::NotFound(format!("Ticket {} not found", ticket_id))),
                Some(ticket) if ticket.is_closed() => {
                    Err(DomainError::Conflict(format!("Ticket {} is closed", ticket_id)))
                }
                // Open ticket, so the external id was already recorded.
                Some(_) => Ok(None),
            },
        }
    }

    async fn append_outbound(
        &self,
        ticket_id: &str,
        response: &NewOutboundResponse,
    ) -> DomainResult<OutboundResponse> {
        response
            .body
            .validate()
            .map_err(DomainError::ValidationError)?;

        let inserted = self
            .insert_message(
                &self.pool,
                MessageInsert {
                    ticket_id,
                    direction: "outbound",
                    body: &response.body,
                    external_message_id: None,
                    sender_id: Some(&response.sender_id),
                },
            )
            .await?;

        match inserted {
            Some(id) => outbound_from_row(&self.fetch_message(&id).await?),
            None => Err(self.explain_missed_write(ticket_id).await),
        }
    }

    async fn reassign(&self, ticket_id: &str, assignee: Option<&str>) -> DomainResult<Ticket> {
        let result = sqlx::query(
            "UPDATE tickets SET assigned_to = ?, updated_at = ? WHERE id = ? AND status <> 'closed'",
        )
        .bind(assignee)
        .bind(timestamp())
        .bind(ticket_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_missed_write(ticket_id).await);
        }
        self.require_ticket(ticket_id).await
    }

    async fn set_status(
        &self,
        ticket_id: &str,
        from: TicketStatus,
        to: TicketStatus,
    ) -> DomainResult<Ticket> {
        let now = timestamp();
        let closing = to == TicketStatus::Closed;

        let result = sqlx::query(
            "UPDATE tickets
             SET status = ?,
                 resolved_at = CASE WHEN ? = 1 THEN MAX(?, created_at) ELSE NULL END,
                 updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(i64::from(closing))
        .bind(&now)
        .bind(&now)
        .bind(ticket_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_missed_write(ticket_id).await);
        }
        self.require_ticket(ticket_id).await
    }

    async fn set_tags(&self, ticket_id: &str, tags: &[String]) -> DomainResult<Ticket> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE tickets SET updated_at = ? WHERE id = ?")
            .bind(timestamp())
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("Ticket {} not found", ticket_id)));
        }

        sqlx::query("DELETE FROM ticket_tags WHERE ticket_id = ?")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        for tag in tags {
            sqlx::query("INSERT OR IGNORE INTO ticket_tags (ticket_id, tag) VALUES (?, ?)")
                .bind(ticket_id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.require_ticket(ticket_id).await
    }

    async fn count_active_by_assignee(
        &self,
        workspace_id: &str,
        user_ids: &[UserId],
    ) -> DomainResult<HashMap<UserId, i64>> {
        let rows = sqlx::query(
            "SELECT assigned_to, COUNT(*) AS active FROM tickets
             WHERE workspace_id = ? AND status <> 'closed' AND assigned_to IS NOT NULL
             GROUP BY assigned_to",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts: HashMap<UserId, i64> = user_ids.iter().map(|id| (id.clone(), 0)).collect();
        for row in rows {
            let user_id: String = row.try_get("assigned_to")?;
            if let Some(count) = counts.get_mut(&user_id) {
                *count = row.try_get("active")?;
            }
        }
        Ok(counts)
    }
}
