use crate::application::services::WorkspaceDirectory;
use crate::domain::errors::DomainResult;
use crate::domain::services::Action;
use crate::infrastructure::realtime::{Session, SessionHub, SessionId};

/// Admits agents into the session hub.
#[derive(Clone)]
pub struct SessionService {
    directory: WorkspaceDirectory,
    hub: SessionHub,
}

impl SessionService {
    pub fn new(directory: WorkspaceDirectory, hub: SessionHub) -> Self {
        Self { directory, hub }
    }

    /// Checks membership without registering anything. Run before accepting an upgrade.
    pub async fn admit(&self, workspace_id: &str, user_id: &str) -> DomainResult<()> {
        self.directory
            .authorize(workspace_id, user_id, Action::OpenSession)
            .await?;
        Ok(())
    }

    /// Re-checks membership and registers the session.
    pub async fn open(&self, workspace_id: &str, user_id: &str) -> DomainResult<Session> {
        self.admit(workspace_id, user_id).await?;
        Ok(self.hub.open(workspace_id, user_id))
    }

    /// Removes the session from the hub. Safe to call more than once.
    pub fn close(&self, workspace_id: &str, session_id: SessionId) -> bool {
        self.hub.close(workspace_id, session_id)
    }

    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }
}
