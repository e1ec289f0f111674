use crate::infrastructure::http::controllers::{
    health, integrations, sessions, tickets, webhooks, workspaces,
};
use crate::infrastructure::http::middleware::{require_auth, AppState};
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    // Bearer-authenticated routes
    let protected = Router::new()
        .route("/messenger/ws/:workspace_id", get(sessions::open_session))
        .route(
            "/integrations/:source/bots",
            post(integrations::register_bot).delete(integrations::deregister_bot),
        )
        // Ticket control
        .route(
            "/tickets/reassign/member",
            post(tickets::reassign_to_member),
        )
        .route("/tickets/reassign/team", post(tickets::reassign_to_team))
        .route("/tickets/status", post(tickets::update_status))
        .route("/tickets/tags", post(tickets::update_tags))
        // Workspace administration
        .route("/workspaces", post(workspaces::create_workspace))
        .route(
            "/workspaces/:workspace_id",
            get(workspaces::get_workspace)
                .patch(workspaces::rename_workspace)
                .delete(workspaces::delete_workspace),
        )
        .route(
            "/workspaces/:workspace_id/members/:user_id",
            put(workspaces::upsert_member).delete(workspaces::remove_member),
        )
        .route(
            "/workspaces/:workspace_id/teams/:team/members/:user_id",
            put(workspaces::upsert_team_member).delete(workspaces::remove_team_member),
        )
        .route(
            "/workspaces/:workspace_id/default-team",
            put(workspaces::set_default_team),
        )
        .route(
            "/workspaces/:workspace_id/availability",
            put(workspaces::update_availability).patch(workspaces::update_availability),
        )
        .route(
            "/workspaces/:workspace_id/tickets",
            get(tickets::list_tickets),
        )
        .route(
            "/workspaces/:workspace_id/tickets/:ticket_id",
            get(tickets::get_ticket),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Public routes
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/integrations/:source/bots/webhook/:bot_token",
            post(webhooks::receive_update),
        )
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
