use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::entities::UserId;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::identity_provider::IdentityProvider;
use crate::domain::ports::user_repository::UserRepository;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// HS256 bearer tokens whose subject must name an existing user.
pub struct JwtIdentityProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    users: Arc<dyn UserRepository>,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str, users: Arc<dyn UserRepository>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            users,
        }
    }

    pub fn issue_token(&self, user_id: &str, ttl: chrono::Duration) -> DomainResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (chrono::Utc::now() + ttl).timestamp().max(0) as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| DomainError::Internal(format!("Failed to sign token: {}", e)))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn authenticate(&self, bearer_token: &str) -> DomainResult<UserId> {
        let token_data = decode::<Claims>(
            bearer_token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| DomainError::Unauthorized(format!("Invalid bearer token: {}", e)))?;

        let user = self
            .users
            .get_user_by_id(&token_data.claims.sub)
            .await?
            .ok_or_else(|| DomainError::Unauthorized("Unknown user".to_string()))?;

        Ok(user.id)
    }
}
