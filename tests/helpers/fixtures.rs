use relaydesk::domain::entities::{Integration, Role, TicketSource, User, UserStatus, Workspace};
use relaydesk::domain::ports::user_repository::UserRepository;
use relaydesk::domain::ports::workspace_repository::WorkspaceRepository;
use relaydesk::infrastructure::persistence::Database;
use serde_json::{json, Value};

pub const WS1: &str = "WS1";
pub const WS2: &str = "WS2";
pub const OWNER: &str = "U-owner";
pub const ADMIN: &str = "U-admin";
pub const AGENT: &str = "U-agent";
pub const SECOND_AGENT: &str = "U-agent-2";
pub const OUTSIDER: &str = "U-member";
pub const OTHER_OWNER: &str = "U-owner-2";
pub const BOT_TOKEN: &str = "BOT-T";
pub const CHAT_ID: &str = "9001";

/// Inserts a user with a fixed id.
pub async fn create_user(db: &Database, id: &str) -> User {
    let mut user = User::new(format!("{}@example.com", id.to_lowercase()), id.to_string());
    user.id = id.to_string();
    db.create_user(&user).await.expect("Failed to create user");
    user
}

pub async fn create_workspace(db: &Database, id: &str, owner_id: &str) -> Workspace {
    let workspace = Workspace::new(id.to_string(), format!("{} Support", id), owner_id.to_string());
    db.create_workspace(&workspace, owner_id)
        .await
        .expect("Failed to create workspace");
    workspace
}

pub async fn add_member(db: &Database, workspace_id: &str, user_id: &str, role: Role) {
    db.upsert_member(workspace_id, user_id, role)
        .await
        .expect("Failed to add member");
}

pub async fn add_team_member(
    db: &Database,
    workspace_id: &str,
    team: &str,
    user_id: &str,
    status: UserStatus,
) {
    db.upsert_team_member(workspace_id, team, user_id, status)
        .await
        .expect("Failed to add team member");
}

pub async fn bind_bot(db: &Database, workspace_id: &str, bot_token: &str) -> Integration {
    let integration = Integration::new(
        workspace_id.to_string(),
        TicketSource::TelegramBot,
        bot_token.to_string(),
        format!(
            "https://desk.example.com/integrations/telegrambot/bots/webhook/{}",
            bot_token
        ),
    );
    db.save_integration(&integration)
        .await
        .expect("Failed to bind bot");
    integration
}

/// WS1: owner, an admin, U-agent available in the default team "triage", and an active
/// bot bound to `BOT-T`. WS2 is a separate workspace owned by U-owner-2 with U-member.
pub async fn seed_workspaces(db: &Database) {
    for id in [OWNER, ADMIN, AGENT, SECOND_AGENT, OUTSIDER, OTHER_OWNER] {
        create_user(db, id).await;
    }

    create_workspace(db, WS1, OWNER).await;
    add_member(db, WS1, ADMIN, Role::Admin).await;
    add_member(db, WS1, AGENT, Role::Member).await;
    add_member(db, WS1, SECOND_AGENT, Role::Member).await;
    add_team_member(db, WS1, "triage", AGENT, UserStatus::Available).await;
    add_team_member(db, WS1, "billing", SECOND_AGENT, UserStatus::Available).await;
    db.set_default_team(WS1, Some("triage"))
        .await
        .expect("Failed to set default team");
    bind_bot(db, WS1, BOT_TOKEN).await;

    create_workspace(db, WS2, OTHER_OWNER).await;
    add_member(db, WS2, OUTSIDER, Role::Member).await;
}

/// A bot-platform text update.
pub fn text_update(message_id: i64, chat_id: i64, text: &str) -> Value {
    json!({
        "update_id": 10_000 + message_id,
        "message": {
            "message_id": message_id,
            "date": 1_767_225_600,
            "chat": { "id": chat_id, "type": "private" },
            "from": { "id": 555, "is_bot": false, "first_name": "Customer" },
            "text": text
        }
    })
}

pub fn photo_update(message_id: i64, chat_id: i64, caption: &str) -> Value {
    json!({
        "update_id": 10_000 + message_id,
        "message": {
            "message_id": message_id,
            "date": 1_767_225_600,
            "chat": { "id": chat_id, "type": "private" },
            "from": { "id": 555, "is_bot": false, "first_name": "Customer" },
            "photo": [
                { "file_id": "small", "file_unique_id": "s", "width": 90, "height": 90 },
                { "file_id": "large", "file_unique_id": "l", "width": 1280, "height": 960 }
            ],
            "caption": caption
        }
    })
}
