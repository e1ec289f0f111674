use crate::domain::entities::UserId;
use crate::domain::errors::DomainResult;

/// Given a bearer token, yields a user identity or rejects with `Unauthorized`.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, bearer_token: &str) -> DomainResult<UserId>;
}
