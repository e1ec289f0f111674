use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::errors::{DomainError, DomainResult};

type HmacSha256 = Hmac<Sha256>;

/// Header the bot platform echoes back on every webhook delivery.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Per-bot secret handed to the platform at registration.
///
/// Hex keeps it inside the platform's allowed alphabet (`A-Z a-z 0-9 _ -`, at most 256 chars).
pub fn secret_token_for(secret: &str, bot_token: &str) -> DomainResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| DomainError::Internal(format!("Invalid webhook secret: {}", e)))?;
    mac.update(bot_token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a presented secret token against the expected one for `bot_token`.
pub fn verify_secret_token(secret: &str, bot_token: &str, presented: &str) -> bool {
    match secret_token_for(secret, bot_token) {
        Ok(expected) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
