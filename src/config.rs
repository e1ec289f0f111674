use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub public_base_url: String,
    pub jwt_secret: String,
    pub webhook_secret: String,
    pub webhook_require_secret: bool,
    pub telegram_api_base: String,
    pub persistence_timeout_secs: u64,
    pub outbound_send_timeout_secs: u64,
    pub outbound_send_max_attempts: u32,
    pub session_frame_timeout_secs: u64,
    pub session_outbox_capacity: usize,
    pub webhook_timeout_secs: u64,
    pub admin_email: Option<String>,
    pub otel_exporter_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://relaydesk.db?mode=rwc".to_string());

        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let server_port = parse_or(&lookup, "SERVER_PORT", 3000u16)?;

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("PUBLIC_BASE_URL"))?
            .trim_end_matches('/')
            .to_string();

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let webhook_secret = lookup("WEBHOOK_SECRET")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| jwt_secret.clone());

        let webhook_require_secret = parse_or(&lookup, "WEBHOOK_REQUIRE_SECRET", true)?;

        let telegram_api_base = lookup("TELEGRAM_API_BASE")
            .unwrap_or_else(|| "https://api.telegram.org".to_string())
            .trim_end_matches('/')
            .to_string();

        let outbound_send_max_attempts = parse_or(&lookup, "OUTBOUND_SEND_MAX_ATTEMPTS", 3u32)?;
        if outbound_send_max_attempts == 0 {
            return Err(ConfigError::Invalid("OUTBOUND_SEND_MAX_ATTEMPTS"));
        }

        let session_outbox_capacity = parse_or(&lookup, "SESSION_OUTBOX_CAPACITY", 64usize)?;
        if session_outbox_capacity == 0 {
            return Err(ConfigError::Invalid("SESSION_OUTBOX_CAPACITY"));
        }

        let metrics_port = match lookup("METRICS_PORT") {
            Some(v) => Some(v.parse().map_err(|_| ConfigError::Invalid("METRICS_PORT"))?),
            None => None,
        };

        Ok(Config {
            database_url,
            server_host,
            server_port,
            public_base_url,
            jwt_secret,
            webhook_secret,
            webhook_require_secret,
            telegram_api_base,
            persistence_timeout_secs: parse_or(&lookup, "PERSISTENCE_TIMEOUT_SECS", 5)?,
            outbound_send_timeout_secs: parse_or(&lookup, "OUTBOUND_SEND_TIMEOUT_SECS", 10)?,
            outbound_send_max_attempts,
            session_frame_timeout_secs: parse_or(&lookup, "SESSION_FRAME_TIMEOUT_SECS", 5)?,
            session_outbox_capacity,
            webhook_timeout_secs: parse_or(&lookup, "WEBHOOK_TIMEOUT_SECS", 30)?,
            admin_email: lookup("ADMIN_EMAIL").filter(|v| !v.trim().is_empty()),
            otel_exporter_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT"),
            service_name: lookup("SERVICE_NAME").unwrap_or_else(|| "relaydesk".to_string()),
            metrics_port,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_secs(self.persistence_timeout_secs)
    }

    pub fn outbound_send_timeout(&self) -> Duration {
        Duration::from_secs(self.outbound_send_timeout_secs)
    }

    pub fn session_frame_timeout(&self) -> Duration {
        Duration::from_secs(self.session_frame_timeout_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("{0} has an invalid value")]
    Invalid(&'static str),
}
