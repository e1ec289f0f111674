pub mod channel_registry;
pub mod jwt_identity;
pub mod retry;
pub mod telegram_bot;
pub mod webhook_secret;

pub use channel_registry::ChannelRegistry;
pub use jwt_identity::JwtIdentityProvider;
pub use retry::RetryPolicy;
pub use telegram_bot::TelegramBotAdapter;
