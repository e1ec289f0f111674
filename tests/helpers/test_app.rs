use std::sync::Arc;
use std::time::Duration;

use relaydesk::application::services::{
    Dispatcher, IntegrationService, SessionService, WorkspaceDirectory,
};
use relaydesk::config::Config;
use relaydesk::domain::ports::fanout::FanoutPublisher;
use relaydesk::domain::ports::identity_provider::IdentityProvider;
use relaydesk::domain::ports::ticket_repository::TicketRepository;
use relaydesk::domain::ports::user_repository::UserRepository;
use relaydesk::domain::ports::workspace_repository::WorkspaceRepository;
use relaydesk::infrastructure::http::middleware::AppState;
use relaydesk::infrastructure::persistence::Database;
use relaydesk::infrastructure::providers::{ChannelRegistry, JwtIdentityProvider};
use relaydesk::infrastructure::realtime::SessionHub;

use super::mock_channel::{MockMessengerChannel, RecordingPublisher};
use super::test_db::{setup_test_db, TestDb};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const PUBLIC_BASE_URL: &str = "https://desk.example.com";

/// The dispatch plane wired against a temporary database and a mock messenger.
pub struct TestApp {
    pub test_db: TestDb,
    pub channel: Arc<MockMessengerChannel>,
    pub hub: SessionHub,
    pub published: Arc<RecordingPublisher>,
    pub directory: WorkspaceDirectory,
    pub dispatcher: Arc<Dispatcher>,
    pub integrations: IntegrationService,
    pub sessions: SessionService,
    pub identity: Arc<JwtIdentityProvider>,
    pub config: Config,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_outbox_capacity(64).await
    }

    pub async fn with_outbox_capacity(capacity: usize) -> Self {
        let test_db = setup_test_db().await;
        let db = test_db.db.clone();

        let user_repo: Arc<dyn UserRepository> = Arc::new(db.clone());
        let workspace_repo: Arc<dyn WorkspaceRepository> = Arc::new(db.clone());
        let ticket_repo: Arc<dyn TicketRepository> = Arc::new(db.clone());

        let channel = Arc::new(MockMessengerChannel::new());
        let channels = ChannelRegistry::new().with_adapter(channel.clone());

        let hub = SessionHub::new(capacity);
        let published = Arc::new(RecordingPublisher::forwarding_to(Arc::new(hub.clone())));

        let directory = WorkspaceDirectory::new(workspace_repo.clone(), user_repo.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            directory.clone(),
            ticket_repo,
            channels.clone(),
            published.clone() as Arc<dyn FanoutPublisher>,
            Duration::from_secs(2),
        ));
        let integrations = IntegrationService::new(
            directory.clone(),
            workspace_repo,
            channels,
            PUBLIC_BASE_URL.to_string(),
            WEBHOOK_SECRET.to_string(),
        );
        let sessions = SessionService::new(directory.clone(), hub.clone());
        let identity = Arc::new(JwtIdentityProvider::new(JWT_SECRET, user_repo));

        let config = Config::from_lookup(|key| match key {
            "PUBLIC_BASE_URL" => Some(PUBLIC_BASE_URL.to_string()),
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            "WEBHOOK_SECRET" => Some(WEBHOOK_SECRET.to_string()),
            "WEBHOOK_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .expect("Failed to build test config");

        Self {
            test_db,
            channel,
            hub,
            published,
            directory,
            dispatcher,
            integrations,
            sessions,
            identity,
            config,
        }
    }

    pub fn db(&self) -> &Database {
        &self.test_db.db
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: Arc::new(self.config.clone()),
            identity: self.identity.clone() as Arc<dyn IdentityProvider>,
            directory: self.directory.clone(),
            dispatcher: self.dispatcher.clone(),
            integration_service: self.integrations.clone(),
            session_service: self.sessions.clone(),
        }
    }

    pub fn token_for(&self, user_id: &str) -> String {
        self.identity
            .issue_token(user_id, chrono::Duration::hours(1))
            .expect("Failed to issue token")
    }
}
