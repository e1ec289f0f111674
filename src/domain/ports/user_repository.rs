use crate::domain::entities::User;
use crate::domain::errors::DomainResult;

#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &User) -> DomainResult<()>;

    async fn get_user_by_id(&self, id: &str) -> DomainResult<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> DomainResult<Option<User>>;
}
