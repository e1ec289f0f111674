pub mod health;
pub mod integrations;
pub mod sessions;
pub mod tickets;
pub mod webhooks;
pub mod workspaces;
