use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = String;

/// Rotating single-use tokens owned by the identity issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserTokens {
    pub confirm: Option<String>,
    pub reset: Option<String>,
    pub refresh: Option<String>,
    pub oauth_handoff: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub is_confirmed: bool,
    pub auth_source: Option<String>,
    #[serde(skip)]
    pub tokens: UserTokens,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn new(email: String, display_name: String) -> Self {
        let now = super::timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.trim().to_lowercase(),
            display_name,
            password_hash: None,
            is_confirmed: false,
            auth_source: None,
            tokens: UserTokens::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
