use crate::domain::entities::{Integration, Role, UserStatus, Workspace};
use crate::domain::errors::DomainResult;

/// Persistence-backed source of truth for workspaces, membership, teams and integrations.
#[async_trait::async_trait]
pub trait WorkspaceRepository: Send + Sync {
    async fn get_workspace(&self, id: &str) -> DomainResult<Option<Workspace>>;

    /// Inserts the workspace with its single owner. Fails with `Conflict` if the id is taken.
    async fn create_workspace(&self, workspace: &Workspace, owner_id: &str) -> DomainResult<()>;

    async fn rename_workspace(&self, id: &str, name: &str) -> DomainResult<()>;

    async fn delete_workspace(&self, id: &str) -> DomainResult<()>;

    async fn upsert_member(&self, workspace_id: &str, user_id: &str, role: Role)
        -> DomainResult<()>;

    /// Removes the member and, in the same transaction, clears them as assignee on the
    /// workspace's tickets.
    async fn remove_member(&self, workspace_id: &str, user_id: &str) -> DomainResult<()>;

    async fn upsert_team_member(
        &self,
        workspace_id: &str,
        team: &str,
        user_id: &str,
        status: UserStatus,
    ) -> DomainResult<()>;

    async fn remove_team_member(
        &self,
        workspace_id: &str,
        team: &str,
        user_id: &str,
    ) -> DomainResult<()>;

    /// Updates the user's availability in every team of the workspace. Returns rows touched.
    async fn set_member_status(
        &self,
        workspace_id: &str,
        user_id: &str,
        status: UserStatus,
    ) -> DomainResult<u64>;

    async fn set_default_team(&self, workspace_id: &str, team: Option<&str>) -> DomainResult<()>;

    async fn find_integration_by_bot_token(
        &self,
        bot_token: &str,
    ) -> DomainResult<Option<Integration>>;

    /// Binds the credential to `integration.workspace_id`, replacing any inactive binding
    /// elsewhere in the same transaction.
    async fn save_integration(&self, integration: &Integration) -> DomainResult<()>;

    async fn set_integration_active(&self, integration_id: &str, active: bool)
        -> DomainResult<()>;
}
