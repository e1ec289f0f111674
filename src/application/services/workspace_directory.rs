use std::sync::Arc;

use crate::domain::entities::{
    CreateWorkspaceRequest, Integration, Role, UserStatus, Workspace,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::user_repository::UserRepository;
use crate::domain::ports::workspace_repository::WorkspaceRepository;
use crate::domain::services::{authorize, Action};

/// Workspace lookups plus the guarded workspace mutations. Nothing is cached: every call
/// reads the store.
#[derive(Clone)]
pub struct WorkspaceDirectory {
    workspace_repo: Arc<dyn WorkspaceRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl WorkspaceDirectory {
    pub fn new(
        workspace_repo: Arc<dyn WorkspaceRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            workspace_repo,
            user_repo,
        }
    }

    pub async fn resolve(&self, workspace_id: &str) -> DomainResult<Workspace> {
        self.workspace_repo
            .get_workspace(workspace_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Workspace {} not found", workspace_id)))
    }

    pub async fn role_of(&self, workspace_id: &str, user_id: &str) -> DomainResult<Option<Role>> {
        Ok(self.resolve(workspace_id).await?.role_of(user_id))
    }

    pub async fn team_of(&self, workspace_id: &str, user_id: &str) -> DomainResult<Option<String>> {
        Ok(self
            .resolve(workspace_id)
            .await?
            .team_of(user_id)
            .map(String::from))
    }

    /// Reverse lookup used by the webhook path. Only active bindings resolve.
    pub async fn integration_by_bot_token(
        &self,
        bot_token: &str,
    ) -> DomainResult<(Workspace, Integration)> {
        let integration = self
            .workspace_repo
            .find_integration_by_bot_token(bot_token)
            .await?
            .filter(|i| i.is_active)
            .ok_or_else(|| DomainError::NotFound("No active integration for bot".to_string()))?;

        let workspace = self.resolve(&integration.workspace_id).await?;
        Ok((workspace, integration))
    }

    /// Resolves the workspace and checks `action` for the caller in one step.
    pub async fn authorize(
        &self,
        workspace_id: &str,
        user_id: &str,
        action: Action<'_>,
    ) -> DomainResult<(Workspace, Role)> {
        let workspace = self.resolve(workspace_id).await?;
        let role = authorize(&workspace, user_id, action)?;
        Ok((workspace, role))
    }

    pub async fn create_workspace(
        &self,
        owner_id: &str,
        request: CreateWorkspaceRequest,
    ) -> DomainResult<Workspace> {
        request.validate().map_err(DomainError::ValidationError)?;

        let workspace = Workspace::new(
            request.workspace_id.trim().to_string(),
            request.name.trim().to_string(),
            owner_id.to_string(),
        );
        self.workspace_repo
            .create_workspace(&workspace, owner_id)
            .await?;

        tracing::info!("Workspace {} created by {}", workspace.id, owner_id);
        Ok(workspace)
    }

    pub async fn rename_workspace(
        &self,
        caller_id: &str,
        workspace_id: &str,
        name: &str,
    ) -> DomainResult<Workspace> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError("name must not be empty".to_string()));
        }
        self.authorize(workspace_id, caller_id, Action::MutateWorkspace)
            .await?;
        self.workspace_repo
            .rename_workspace(workspace_id, name.trim())
            .await?;
        self.resolve(workspace_id).await
    }

    pub async fn delete_workspace(&self, caller_id: &str, workspace_id: &str) -> DomainResult<()> {
        self.authorize(workspace_id, caller_id, Action::DestroyWorkspace)
            .await?;
        self.workspace_repo.delete_workspace(workspace_id).await?;
        tracing::info!("Workspace {} deleted by {}", workspace_id, caller_id);
        Ok(())
    }

    /// Adds a member or changes their role. Ownership never moves through this call.
    pub async fn upsert_member(
        &self,
        caller_id: &str,
        workspace_id: &str,
        user_id: &str,
        role: Role,
    ) -> DomainResult<Workspace> {
        if role == Role::Owner {
            return Err(DomainError::ValidationError(
                "A workspace has exactly one owner".to_string(),
            ));
        }

        let (workspace, _) = self
            .authorize(workspace_id, caller_id, Action::MutateWorkspace)
            .await?;

        if workspace.role_of(user_id) == Some(Role::Owner) {
            return Err(DomainError::Conflict(
                "The owner's role cannot be changed".to_string(),
            ));
        }

        if self.user_repo.get_user_by_id(user_id).await?.is_none() {
            return Err(DomainError::NotFound(format!("User {} not found", user_id)));
        }

        self.workspace_repo
            .upsert_member(workspace_id, user_id, role)
            .await?;
        tracing::info!(
            "User {} is now {} in workspace {}",
            user_id,
            role,
            workspace_id
        );
        self.resolve(workspace_id).await
    }

    pub async fn remove_member(
        &self,
        caller_id: &str,
        workspace_id: &str,
        user_id: &str,
    ) -> DomainResult<Workspace> {
        let (workspace, _) = self
            .authorize(workspace_id, caller_id, Action::MutateWorkspace)
            .await?;

        match workspace.role_of(user_id) {
            None => {
                return Err(DomainError::NotFound(format!(
                    "User {} is not a member of workspace {}",
                    user_id, workspace_id
                )))
            }
            Some(Role::Owner) => {
                return Err(DomainError::Conflict(
                    "The owner cannot be removed".to_string(),
                ))
            }
            Some(_) => {}
        }

        self.workspace_repo
            .remove_member(workspace_id, user_id)
            .await?;
        tracing::info!("User {} removed from workspace {}", user_id, workspace_id);
        self.resolve(workspace_id).await
    }

    pub async fn upsert_team_member(
        &self,
        caller_id: &str,
        workspace_id: &str,
        team: &str,
        user_id: &str,
        status: UserStatus,
    ) -> DomainResult<Workspace> {
        let team = team.trim();
        if team.is_empty() {
            return Err(DomainError::ValidationError(
                "team must not be empty".to_string(),
            ));
        }

        let (workspace, _) = self
            .authorize(workspace_id, caller_id, Action::MutateWorkspace)
            .await?;
        if !workspace.is_member(user_id) {
            return Err(DomainError::ValidationError(format!(
                "User {} must be a workspace member before joining a team",
                user_id
            )));
        }

        self.workspace_repo
            .upsert_team_member(workspace_id, team, user_id, status)
            .await?;
        self.resolve(workspace_id).await
    }

    pub async fn remove_team_member(
        &self,
        caller_id: &str,
        workspace_id: &str,
        team: &str,
        user_id: &str,
    ) -> DomainResult<Workspace> {
        self.authorize(workspace_id, caller_id, Action::MutateWorkspace)
            .await?;
        self.workspace_repo
            .remove_team_member(workspace_id, team, user_id)
            .await?;
        self.resolve(workspace_id).await
    }

    pub async fn set_default_team(
        &self,
        caller_id: &str,
        workspace_id: &str,
        team: Option<&str>,
    ) -> DomainResult<Workspace> {
        let team = team.map(str::trim).filter(|t| !t.is_empty());
        self.authorize(workspace_id, caller_id, Action::MutateWorkspace)
            .await?;
        self.workspace_repo
            .set_default_team(workspace_id, team)
            .await?;
        self.resolve(workspace_id).await
    }

    /// Sets the caller's availability in every team they belong to.
    pub async fn update_own_availability(
        &self,
        caller_id: &str,
        workspace_id: &str,
        status: UserStatus,
    ) -> DomainResult<Workspace> {
        self.authorize(workspace_id, caller_id, Action::UpdateOwnAvailability)
            .await?;
        let touched = self
            .workspace_repo
            .set_member_status(workspace_id, caller_id, status)
            .await?;
        if touched == 0 {
            return Err(DomainError::ValidationError(format!(
                "User {} is not in any team of workspace {}",
                caller_id, workspace_id
            )));
        }
        self.resolve(workspace_id).await
    }
}
