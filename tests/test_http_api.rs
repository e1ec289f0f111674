mod helpers;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use helpers::*;
use relaydesk::domain::entities::{TicketSource, TicketStatus};
use relaydesk::domain::ports::ticket_repository::TicketRepository;
use relaydesk::infrastructure::http::router::build_router;
use relaydesk::infrastructure::providers::webhook_secret::{secret_token_for, SECRET_TOKEN_HEADER};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

async fn seeded_app() -> (TestApp, Router) {
    let app = TestApp::new().await;
    seed_workspaces(app.db()).await;
    let router = build_router(app.state());
    (app, router)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("Router call failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn webhook(bot_token: &str, secret: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("/integrations/telegrambot/bots/webhook/{}", bot_token))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header(SECRET_TOKEN_HEADER, secret);
    }
    builder.body(body.into()).unwrap()
}

fn authed(method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn valid_secret() -> String {
    secret_token_for(WEBHOOK_SECRET, BOT_TOKEN).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_app, router) = seeded_app().await;
    let (status, body) = send(
        &router,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_webhook_requires_secret_token() {
    let (app, router) = seeded_app().await;
    let update = text_update(42, 9001, "hello").to_string();

    let (status, _) = send(&router, webhook(BOT_TOKEN, None, update.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&router, webhook(BOT_TOKEN, Some("forged"), update)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(app.db().list_tickets(WS1, None, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_creates_then_appends() {
    let (app, router) = seeded_app().await;
    let secret = valid_secret();

    let (status, body) = send(
        &router,
        webhook(BOT_TOKEN, Some(&secret), text_update(42, 9001, "hello").to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Ticket created");
    let ticket_id = body["ticket_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        webhook(BOT_TOKEN, Some(&secret), text_update(43, 9001, "again").to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket_id"], ticket_id.as_str());

    // Redelivery is acknowledged.
    let (status, body) = send(
        &router,
        webhook(BOT_TOKEN, Some(&secret), text_update(43, 9001, "again").to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Update already recorded");

    let thread = app.db().get_thread(&ticket_id).await.unwrap().unwrap();
    assert_eq!(thread.inbound_messages.len(), 2);
}

#[tokio::test]
async fn test_webhook_rejects_bad_input() {
    let (_app, router) = seeded_app().await;
    let secret = valid_secret();

    let (status, _) = send(&router, webhook(BOT_TOKEN, Some(&secret), "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/integrations/carrierpigeon/bots/webhook/{}", BOT_TOKEN))
        .body(Body::from("{}"))
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let other_secret = secret_token_for(WEBHOOK_SECRET, "BOT-UNKNOWN").unwrap();
    let (status, _) = send(
        &router,
        webhook("BOT-UNKNOWN", Some(&other_secret), text_update(1, 1, "hi").to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_acknowledges_ignored_updates() {
    let (_app, router) = seeded_app().await;
    let update = json!({ "update_id": 1, "callback_query": { "id": "cb" } });
    let (status, body) = send(
        &router,
        webhook(BOT_TOKEN, Some(&valid_secret()), update.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Update ignored");
}

#[tokio::test]
async fn test_protected_routes_need_bearer() {
    let (app, router) = seeded_app().await;

    let request = Request::get(format!("/workspaces/{}/tickets", WS1))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &router,
        authed(Method::GET, &format!("/workspaces/{}/tickets", WS1), "garbage", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.token_for(AGENT);
    let (status, body) = send(
        &router,
        authed(Method::GET, &format!("/workspaces/{}/tickets", WS1), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["tickets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_bot_over_http() {
    let (app, router) = seeded_app().await;
    let payload = json!({ "workspace_id": WS1, "bot_token": "BOT-HTTP" });

    let (status, _) = send(
        &router,
        authed(
            Method::POST,
            "/integrations/telegrambot/bots",
            &app.token_for(AGENT),
            Some(payload.clone()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &router,
        authed(
            Method::POST,
            "/integrations/telegrambot/bots",
            &app.token_for(OWNER),
            Some(payload),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["integration"]["bot_token"], "BOT-HTTP");
    assert_eq!(body["integration"]["is_active"], true);

    let (status, _) = send(
        &router,
        authed(
            Method::POST,
            "/integrations/telegrambot/bots",
            &app.token_for(OTHER_OWNER),
            Some(json!({ "workspace_id": WS2, "bot_token": "BOT-HTTP" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_closed_ticket_status_change_conflicts() {
    let (app, router) = seeded_app().await;
    app.dispatcher
        .handle_inbound(TicketSource::TelegramBot, BOT_TOKEN, &text_update(42, 9001, "hello"))
        .await
        .unwrap();
    let ticket = app
        .db()
        .find_open_ticket(WS1, TicketSource::TelegramBot, CHAT_ID)
        .await
        .unwrap()
        .unwrap();
    let token = app.token_for(AGENT);

    let close = json!({ "workspace_id": WS1, "ticket_id": ticket.id, "status": "closed" });
    let (status, body) = send(
        &router,
        authed(Method::POST, "/tickets/status", &token, Some(close)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket"]["status"], "closed");

    let reopen = json!({ "workspace_id": WS1, "ticket_id": ticket.id, "status": "open" });
    let (status, _) = send(
        &router,
        authed(Method::POST, "/tickets/status", &token, Some(reopen)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stored = app.db().get_ticket(&ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TicketStatus::Closed);
}

#[tokio::test]
async fn test_ticket_thread_is_workspace_scoped() {
    let (app, router) = seeded_app().await;
    app.dispatcher
        .handle_inbound(TicketSource::TelegramBot, BOT_TOKEN, &text_update(42, 9001, "hello"))
        .await
        .unwrap();
    let ticket = app
        .db()
        .find_open_ticket(WS1, TicketSource::TelegramBot, CHAT_ID)
        .await
        .unwrap()
        .unwrap();

    let uri = format!("/workspaces/{}/tickets/{}", WS1, ticket.id);
    let (status, body) = send(
        &router,
        authed(Method::GET, &uri, &app.token_for(ADMIN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket"]["id"], ticket.id.as_str());
    assert_eq!(body["inbound_messages"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &router,
        authed(Method::GET, &uri, &app.token_for(OUTSIDER), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let foreign = format!("/workspaces/{}/tickets/{}", WS2, ticket.id);
    let (status, _) = send(
        &router,
        authed(Method::GET, &foreign, &app.token_for(OTHER_OWNER), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_upgrade_denied_for_non_member() {
    let (app, router) = seeded_app().await;
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/messenger/ws/{}", WS1))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token_for(OUTSIDER)))
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.hub.total_sessions(), 0);
}

#[tokio::test]
async fn test_workspace_admin_over_http() {
    let (app, router) = seeded_app().await;
    let owner = app.token_for(OWNER);

    let (status, body) = send(
        &router,
        authed(
            Method::PUT,
            &format!("/workspaces/{}/members/{}", WS1, OUTSIDER),
            &owner,
            Some(json!({ "role": "member" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);

    let (status, body) = send(
        &router,
        authed(Method::GET, &format!("/workspaces/{}", WS1), &app.token_for(OUTSIDER), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], WS1);
    assert_eq!(body["members"][OUTSIDER], "member");

    let (status, _) = send(
        &router,
        authed(Method::DELETE, &format!("/workspaces/{}", WS1), &app.token_for(ADMIN), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_past_deadline_asks_for_redelivery_and_still_files() {
    let mut app = TestApp::new().await;
    seed_workspaces(app.db()).await;
    app.config.webhook_timeout_secs = 1;
    let router = build_router(app.state());
    let secret = valid_secret();
    let update = text_update(42, 9001, "hello").to_string();

    // Holding SQLite's write lock stalls the filing behind it.
    let mut writer = app.db().pool().acquire().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *writer)
        .await
        .unwrap();

    let (status, body) = send(&router, webhook(BOT_TOKEN, Some(&secret), update.clone())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    sqlx::query("COMMIT").execute(&mut *writer).await.unwrap();
    drop(writer);

    let mut published = 0;
    for _ in 0..200 {
        published = app.published.events().len();
        if published > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(published, 1);

    // The platform's redelivery is acknowledged and not fanned out again.
    let (status, body) = send(&router, webhook(BOT_TOKEN, Some(&secret), update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Update already recorded");
    assert_eq!(app.published.events().len(), 1);
    assert_eq!(app.db().list_tickets(WS1, None, 10, 0).await.unwrap().len(), 1);
}
