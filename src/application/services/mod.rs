pub mod dispatcher;
pub mod integration_service;
pub mod session_service;
pub mod workspace_directory;

pub use dispatcher::{Dispatcher, InboundOutcome};
pub use integration_service::{BotCredentialRequest, IntegrationService};
pub use session_service::SessionService;
pub use workspace_directory::WorkspaceDirectory;
