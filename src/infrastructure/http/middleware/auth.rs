use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::application::services::{
    Dispatcher, IntegrationService, SessionService, WorkspaceDirectory,
};
use crate::config::Config;
use crate::domain::entities::UserId;
use crate::domain::ports::identity_provider::IdentityProvider;
use crate::infrastructure::http::middleware::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityProvider>,
    pub directory: WorkspaceDirectory,
    pub dispatcher: Arc<Dispatcher>,
    pub integration_service: IntegrationService,
    pub session_service: SessionService,
}

/// Caller identity attached to the request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Resolves the bearer token to a user and stores it as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let user_id = state.identity.authenticate(bearer.token()).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user_id });
    Ok(next.run(request).await)
}
