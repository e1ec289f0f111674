pub mod fanout;
pub mod identity_provider;
pub mod messenger_channel;
pub mod ticket_repository;
pub mod user_repository;
pub mod workspace_repository;
