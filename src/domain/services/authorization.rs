use crate::domain::entities::{Role, Ticket, TicketStatus, Workspace};
use crate::domain::errors::{DomainError, DomainResult};

/// Operations guarded by workspace role and team membership.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    ManageIntegration,
    SendMessage { ticket: &'a Ticket },
    /// `target: None` clears the assignee.
    ReassignToMember { ticket: &'a Ticket, target: Option<&'a str> },
    ReassignToTeam { ticket: &'a Ticket, team: &'a str },
    ChangeStatus { ticket: &'a Ticket, to: TicketStatus },
    EditTags,
    ViewTickets,
    OpenSession,
    UpdateOwnAvailability,
    MutateWorkspace,
    DestroyWorkspace,
}

impl Action<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Action::ManageIntegration => "manage_integration",
            Action::SendMessage { .. } => "send_message",
            Action::ReassignToMember { .. } => "reassign_member",
            Action::ReassignToTeam { .. } => "reassign_team",
            Action::ChangeStatus { .. } => "change_status",
            Action::EditTags => "edit_tags",
            Action::ViewTickets => "view_tickets",
            Action::OpenSession => "open_session",
            Action::UpdateOwnAvailability => "update_availability",
            Action::MutateWorkspace => "mutate_workspace",
            Action::DestroyWorkspace => "destroy_workspace",
        }
    }
}

/// Decides whether `user_id` may perform `action` in `workspace`. Returns the caller's role.
pub fn authorize(workspace: &Workspace, user_id: &str, action: Action<'_>) -> DomainResult<Role> {
    let role = workspace.role_of(user_id).ok_or_else(|| {
        DomainError::Forbidden(format!(
            "User {} is not a member of workspace {}",
            user_id, workspace.id
        ))
    })?;

    let allowed = match action {
        Action::ManageIntegration | Action::MutateWorkspace => role.is_manager(),
        Action::DestroyWorkspace => role == Role::Owner,
        Action::SendMessage { ticket } => role.is_manager() || ticket.is_assigned_to(user_id),
        Action::ReassignToMember { ticket, target } => {
            role.is_manager()
                || match target {
                    Some(target) => {
                        let mut involved = vec![user_id, target];
                        involved.extend(ticket.assigned_to.as_deref());
                        within_one_team(workspace, &involved)
                    }
                    None => ticket.is_assigned_to(user_id),
                }
        }
        Action::ReassignToTeam { ticket, team } => {
            role.is_manager()
                || (workspace.is_in_team(team, user_id)
                    && ticket
                        .assigned_to
                        .as_deref()
                        .map_or(true, |assignee| workspace.is_in_team(team, assignee)))
        }
        Action::ChangeStatus { ticket, to } => {
            to != TicketStatus::Closed || role.is_manager() || ticket.is_assigned_to(user_id)
        }
        Action::EditTags
        | Action::ViewTickets
        | Action::OpenSession
        | Action::UpdateOwnAvailability => true,
    };

    if allowed {
        Ok(role)
    } else {
        Err(DomainError::Forbidden(format!(
            "Role '{}' may not perform '{}' in workspace {}",
            role,
            action.name(),
            workspace.id
        )))
    }
}

/// Members move tickets only inside a team they share with everyone involved.
fn within_one_team(workspace: &Workspace, users: &[&str]) -> bool {
    workspace.teams.values().any(|members| {
        users
            .iter()
            .all(|user| members.iter().any(|m| m.user_id == *user))
    })
}
