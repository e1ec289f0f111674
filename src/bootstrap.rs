use crate::application::services::{
    Dispatcher, IntegrationService, SessionService, WorkspaceDirectory,
};
use crate::config::Config;
use crate::domain::entities::User;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::fanout::FanoutPublisher;
use crate::domain::ports::identity_provider::IdentityProvider;
use crate::domain::ports::ticket_repository::TicketRepository;
use crate::domain::ports::user_repository::UserRepository;
use crate::domain::ports::workspace_repository::WorkspaceRepository;
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::persistence::Database;
use crate::infrastructure::providers::{
    ChannelRegistry, JwtIdentityProvider, RetryPolicy, TelegramBotAdapter,
};
use crate::infrastructure::realtime::SessionHub;
use std::sync::Arc;

/// Bootstrap tokens are only meant to get a fresh deployment going.
const BOOTSTRAP_TOKEN_TTL_HOURS: i64 = 12;

pub fn build_app_state(db: Database, config: &Config) -> DomainResult<AppState> {
    let config = Arc::new(config.clone());

    let user_repo: Arc<dyn UserRepository> = Arc::new(db.clone());
    let workspace_repo: Arc<dyn WorkspaceRepository> = Arc::new(db.clone());
    let ticket_repo: Arc<dyn TicketRepository> = Arc::new(db);

    let directory = WorkspaceDirectory::new(workspace_repo.clone(), user_repo.clone());

    // Messenger adapters
    let retry = RetryPolicy::with_max_attempts(config.outbound_send_max_attempts);
    let telegram = TelegramBotAdapter::new(&config.telegram_api_base, retry)?;
    let channels = ChannelRegistry::new().with_adapter(Arc::new(telegram));
    tracing::info!("Messenger adapters registered: {:?}", channels.sources());

    let hub = SessionHub::new(config.session_outbox_capacity);
    let dispatcher = Arc::new(Dispatcher::new(
        directory.clone(),
        ticket_repo,
        channels.clone(),
        Arc::new(hub.clone()) as Arc<dyn FanoutPublisher>,
        config.outbound_send_timeout(),
    ));

    let integration_service = IntegrationService::new(
        directory.clone(),
        workspace_repo,
        channels,
        config.public_base_url.clone(),
        config.webhook_secret.clone(),
    );
    let session_service = SessionService::new(directory.clone(), hub);

    let identity: Arc<dyn IdentityProvider> =
        Arc::new(JwtIdentityProvider::new(&config.jwt_secret, user_repo));

    Ok(AppState {
        config,
        identity,
        directory,
        dispatcher,
        integration_service,
        session_service,
    })
}

/// Makes sure a user exists for `ADMIN_EMAIL` and hands out a short-lived token for it.
pub async fn initialize_admin(db: &Database, config: &Config) -> DomainResult<Option<User>> {
    let Some(admin_email) = config.admin_email.as_deref() else {
        return Ok(None);
    };
    let email = admin_email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(DomainError::ValidationError(format!(
            "ADMIN_EMAIL '{}' is not an email address",
            admin_email
        )));
    }

    if let Some(user) = db.get_user_by_email(&email).await? {
        tracing::info!("Admin user already exists: {} ({})", email, user.id);
        return Ok(Some(user));
    }

    let mut user = User::new(email.clone(), "Admin".to_string());
    user.is_confirmed = true;
    db.create_user(&user).await?;

    let users: Arc<dyn UserRepository> = Arc::new(db.clone());
    let token = JwtIdentityProvider::new(&config.jwt_secret, users)
        .issue_token(&user.id, chrono::Duration::hours(BOOTSTRAP_TOKEN_TTL_HOURS))?;

    tracing::info!("Admin user created: {} ({})", email, user.id);
    tracing::info!(
        "Bootstrap bearer token (valid {}h): {}",
        BOOTSTRAP_TOKEN_TTL_HOURS,
        token
    );

    Ok(Some(user))
}
