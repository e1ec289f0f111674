use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::entities::{
    ReassignToMemberRequest, ReassignToTeamRequest, TicketStatus, TicketThread,
    UpdateStatusRequest, UpdateTagsRequest,
};
use crate::infrastructure::http::middleware::{ApiResult, AppState, AuthenticatedUser};

/// POST /tickets/reassign/member - Assign to a member, or unassign with `user_id: null`
pub async fn reassign_to_member(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Json(request): Json<ReassignToMemberRequest>,
) -> ApiResult<Json<Value>> {
    let ticket = state
        .dispatcher
        .reassign_to_member(&auth_user.user_id, request)
        .await?;
    Ok(Json(json!({ "message": "Ticket reassigned", "ticket": ticket })))
}

/// POST /tickets/reassign/team - Assign to an available member of a team
pub async fn reassign_to_team(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Json(request): Json<ReassignToTeamRequest>,
) -> ApiResult<Json<Value>> {
    let ticket = state
        .dispatcher
        .reassign_to_team(&auth_user.user_id, request)
        .await?;
    Ok(Json(json!({ "message": "Ticket reassigned", "ticket": ticket })))
}

/// POST /tickets/status
pub async fn update_status(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Value>> {
    let ticket = state
        .dispatcher
        .change_status(&auth_user.user_id, request)
        .await?;
    Ok(Json(json!({ "message": "Ticket status updated", "ticket": ticket })))
}

/// POST /tickets/tags - Replace the tag set
pub async fn update_tags(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Json(request): Json<UpdateTagsRequest>,
) -> ApiResult<Json<Value>> {
    let ticket = state
        .dispatcher
        .set_tags(&auth_user.user_id, request)
        .await?;
    Ok(Json(json!({ "message": "Ticket tags updated", "ticket": ticket })))
}

#[derive(Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<TicketStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /workspaces/:workspace_id/tickets
pub async fn list_tickets(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path(workspace_id): Path<String>,
    Query(query): Query<ListTicketsQuery>,
) -> ApiResult<Json<Value>> {
    let tickets = state
        .dispatcher
        .list_tickets(
            &auth_user.user_id,
            &workspace_id,
            query.status,
            query.limit,
            query.offset,
        )
        .await?;
    Ok(Json(json!({ "tickets": tickets })))
}

/// GET /workspaces/:workspace_id/tickets/:ticket_id - Ticket with both timelines
pub async fn get_ticket(
    State(state): State<AppState>,
    axum::Extension(auth_user): axum::Extension<AuthenticatedUser>,
    Path((workspace_id, ticket_id)): Path<(String, String)>,
) -> ApiResult<Json<TicketThread>> {
    let thread = state
        .dispatcher
        .get_thread(&auth_user.user_id, &workspace_id, &ticket_id)
        .await?;
    Ok(Json(thread))
}
