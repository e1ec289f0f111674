use serde::Deserialize;
use tracing::{info, warn};

use crate::application::services::WorkspaceDirectory;
use crate::domain::entities::{Integration, TicketSource, WorkspaceId};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::workspace_repository::WorkspaceRepository;
use crate::domain::services::Action;
use crate::infrastructure::providers::webhook_secret::secret_token_for;
use crate::infrastructure::providers::ChannelRegistry;

use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct BotCredentialRequest {
    pub workspace_id: WorkspaceId,
    pub bot_token: String,
}

impl BotCredentialRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.workspace_id.trim().is_empty() {
            return Err("workspace_id must not be empty".to_string());
        }
        let token = self.bot_token.trim();
        if token.is_empty() {
            return Err("bot_token must not be empty".to_string());
        }
        // The token travels as a URL path segment.
        if token.contains(['/', '?', '#']) || token.chars().any(char::is_whitespace) {
            return Err("bot_token contains characters not allowed in a webhook path".to_string());
        }
        Ok(())
    }
}

/// Binds messenger bot credentials to workspaces and points the platform's webhook at us.
#[derive(Clone)]
pub struct IntegrationService {
    directory: WorkspaceDirectory,
    workspace_repo: Arc<dyn WorkspaceRepository>,
    channels: ChannelRegistry,
    public_base_url: String,
    webhook_secret: String,
}

impl IntegrationService {
    pub fn new(
        directory: WorkspaceDirectory,
        workspace_repo: Arc<dyn WorkspaceRepository>,
        channels: ChannelRegistry,
        public_base_url: String,
        webhook_secret: String,
    ) -> Self {
        Self {
            directory,
            workspace_repo,
            channels,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            webhook_secret,
        }
    }

    pub fn callback_url(&self, source: TicketSource, bot_token: &str) -> String {
        format!(
            "{}/integrations/{}/bots/webhook/{}",
            self.public_base_url,
            source.path_segment(),
            bot_token
        )
    }

    /// Registers the credential. Registering an already active credential into the same
    /// workspace returns the existing entry and leaves the platform untouched.
    pub async fn register(
        &self,
        caller_id: &str,
        source: TicketSource,
        request: BotCredentialRequest,
    ) -> DomainResult<Integration> {
        request.validate().map_err(DomainError::ValidationError)?;
        let bot_token = request.bot_token.trim();

        let (workspace, _) = self
            .directory
            .authorize(&request.workspace_id, caller_id, Action::ManageIntegration)
            .await?;
        let adapter = self.channels.adapter(source)?;

        if let Some(existing) = self
            .workspace_repo
            .find_integration_by_bot_token(bot_token)
            .await?
        {
            if existing.is_active {
                if existing.workspace_id == workspace.id && existing.source == source {
                    info!(
                        "Integration {} already active in workspace {}",
                        existing.id, workspace.id
                    );
                    return Ok(existing);
                }
                return Err(DomainError::Conflict(
                    "Bot credential is already bound to another workspace".to_string(),
                ));
            }
        }

        let webhook_url = self.callback_url(source, bot_token);
        let secret_token = secret_token_for(&self.webhook_secret, bot_token)?;
        adapter
            .register_webhook(bot_token, &webhook_url, &secret_token)
            .await?;

        let integration = Integration::new(
            workspace.id.clone(),
            source,
            bot_token.to_string(),
            webhook_url,
        );
        self.workspace_repo.save_integration(&integration).await?;

        info!(
            "Integration {} ({}) registered in workspace {} by {}",
            integration.id, source, workspace.id, caller_id
        );
        Ok(integration)
    }

    pub async fn deregister(
        &self,
        caller_id: &str,
        source: TicketSource,
        request: BotCredentialRequest,
    ) -> DomainResult<Integration> {
        request.validate().map_err(DomainError::ValidationError)?;
        let bot_token = request.bot_token.trim();

        let (workspace, _) = self
            .directory
            .authorize(&request.workspace_id, caller_id, Action::ManageIntegration)
            .await?;

        let mut integration = self
            .workspace_repo
            .find_integration_by_bot_token(bot_token)
            .await?
            .filter(|i| i.workspace_id == workspace.id && i.source == source)
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "No {} integration for this credential in workspace {}",
                    source, workspace.id
                ))
            })?;

        if integration.is_active {
            let adapter = self.channels.adapter(source)?;
            adapter.deregister_webhook(bot_token).await?;
            self.workspace_repo
                .set_integration_active(&integration.id, false)
                .await?;
            integration.is_active = false;
            warn!(
                "Integration {} deregistered from workspace {} by {}",
                integration.id, workspace.id, caller_id
            );
        }

        Ok(integration)
    }
}
