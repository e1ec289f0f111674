use crate::domain::entities::{User, UserTokens};
use crate::domain::errors::DomainResult;
use crate::domain::ports::user_repository::UserRepository;
use crate::infrastructure::persistence::{bool_to_int, Database};
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::Row;

const USER_COLUMNS: &str = "id, email, display_name, password_hash, is_confirmed, auth_source,
     confirm_token, reset_token, refresh_token, oauth_handoff_token, created_at, updated_at";

fn user_from_row(row: &AnyRow) -> DomainResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        password_hash: row.try_get("password_hash")?,
        is_confirmed: row.try_get::<i64, _>("is_confirmed")? != 0,
        auth_source: row.try_get("auth_source")?,
        tokens: UserTokens {
            confirm: row.try_get("confirm_token")?,
            reset: row.try_get("reset_token")?,
            refresh: row.try_get("refresh_token")?,
            oauth_handoff: row.try_get("oauth_handoff_token")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserRepository for Database {
    async fn create_user(&self, user: &User) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO users (id, email, display_name, password_hash, is_confirmed, auth_source,
                                confirm_token, reset_token, refresh_token, oauth_handoff_token,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(bool_to_int(user.is_confirmed))
        .bind(&user.auth_source)
        .bind(&user.tokens.confirm)
        .bind(&user.tokens.reset)
        .bind(&user.tokens.refresh)
        .bind(&user.tokens.oauth_handoff)
        .bind(&user.created_at)
        .bind(&user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_user_by_id(&self, id: &str) -> DomainResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}
