use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::entities::{CreateWorkspaceRequest, Role, UserStatus, Workspace};
use crate::domain::services::Action;
use crate::infrastructure::http::middleware::{ApiResult, AppState, AuthenticatedUser};

#[derive(Deserialize)]
pub struct RenameWorkspaceRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct MemberRoleRequest {
    pub role: Role,
}

#[derive(Deserialize)]
pub struct TeamMemberRequest {
    #[serde(default)]
    pub status: UserStatus,
}

#[derive(Deserialize)]
pub struct DefaultTeamRequest {
    pub team: Option<String>,
}

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub status: UserStatus,
}

/// POST /workspaces - Create a workspace owned by the caller
pub async fn create_workspace(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Json(request): Json<CreateWorkspaceRequest>,
) -> ApiResult<(StatusCode, Json<Workspace>)> {
    let workspace = state
        .directory
        .create_workspace(&auth_user.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

/// GET /workspaces/:workspace_id
pub async fn get_workspace(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path(workspace_id): Path<String>,
) -> ApiResult<Json<Workspace>> {
    let (workspace, _) = state
        .directory
        .authorize(&workspace_id, &auth_user.user_id, Action::ViewTickets)
        .await?;
    Ok(Json(workspace))
}

/// PATCH /workspaces/:workspace_id
pub async fn rename_workspace(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path(workspace_id): Path<String>,
    Json(request): Json<RenameWorkspaceRequest>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .directory
        .rename_workspace(&auth_user.user_id, &workspace_id, &request.name)
        .await?;
    Ok(Json(workspace))
}

/// DELETE /workspaces/:workspace_id - Owner only
pub async fn delete_workspace(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path(workspace_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .directory
        .delete_workspace(&auth_user.user_id, &workspace_id)
        .await?;
    Ok(Json(json!({ "message": "Workspace deleted" })))
}

/// PUT /workspaces/:workspace_id/members/:user_id - Add a member or change their role
pub async fn upsert_member(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path((workspace_id, user_id)): Path<(String, String)>,
    Json(request): Json<MemberRoleRequest>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .directory
        .upsert_member(&auth_user.user_id, &workspace_id, &user_id, request.role)
        .await?;
    Ok(Json(workspace))
}

/// DELETE /workspaces/:workspace_id/members/:user_id
pub async fn remove_member(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path((workspace_id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .directory
        .remove_member(&auth_user.user_id, &workspace_id, &user_id)
        .await?;
    Ok(Json(workspace))
}

/// PUT /workspaces/:workspace_id/teams/:team/members/:user_id
pub async fn upsert_team_member(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path((workspace_id, team, user_id)): Path<(String, String, String)>,
    Json(request): Json<TeamMemberRequest>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .directory
        .upsert_team_member(
            &auth_user.user_id,
            &workspace_id,
            &team,
            &user_id,
            request.status,
        )
        .await?;
    Ok(Json(workspace))
}

/// DELETE /workspaces/:workspace_id/teams/:team/members/:user_id
pub async fn remove_team_member(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path((workspace_id, team, user_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .directory
        .remove_team_member(&auth_user.user_id, &workspace_id, &team, &user_id)
        .await?;
    Ok(Json(workspace))
}

/// PUT /workspaces/:workspace_id/default-team - `team: null` clears it
pub async fn set_default_team(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path(workspace_id): Path<String>,
    Json(request): Json<DefaultTeamRequest>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .directory
        .set_default_team(&auth_user.user_id, &workspace_id, request.team.as_deref())
        .await?;
    Ok(Json(workspace))
}

/// PUT /workspaces/:workspace_id/availability - Caller's own status in their teams
pub async fn update_availability(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path(workspace_id): Path<String>,
    Json(request): Json<AvailabilityRequest>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .directory
        .update_own_availability(&auth_user.user_id, &workspace_id, request.status)
        .await?;
    Ok(Json(workspace))
}
