use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use super::ticket::TicketSource;
use super::UserId;

pub type WorkspaceId = String;

/// Role of a user inside one workspace. Ordered `Member < Admin < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    pub fn is_manager(&self) -> bool {
        *self >= Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Availability of a team member for automatic ticket assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Available,
    Busy,
    OnBreak,
    #[default]
    Offline,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Available => "available",
            UserStatus::Busy => "busy",
            UserStatus::OnBreak => "on_break",
            UserStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(UserStatus::Available),
            "busy" => Ok(UserStatus::Busy),
            "on_break" | "onbreak" => Ok(UserStatus::OnBreak),
            "offline" => Ok(UserStatus::Offline),
            other => Err(format!("Unknown user status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: UserId,
    pub status: UserStatus,
}

/// A messenger credential bound to a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub workspace_id: WorkspaceId,
    pub source: TicketSource,
    /// The bot credential doubles as the webhook routing key and is never echoed back.
    #[serde(skip_serializing, default)]
    pub bot_token: String,
    pub webhook_url: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Integration {
    pub fn new(
        workspace_id: WorkspaceId,
        source: TicketSource,
        bot_token: String,
        webhook_url: String,
    ) -> Self {
        let now = super::timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id,
            source,
            bot_token,
            webhook_url,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub members: HashMap<UserId, Role>,
    /// Team name -> members, ordered by name so team resolution is deterministic.
    pub teams: BTreeMap<String, Vec<TeamMember>>,
    pub default_team: Option<String>,
    pub integrations: Vec<Integration>,
    pub created_at: String,
    pub updated_at: String,
}

impl Workspace {
    pub fn new(id: WorkspaceId, name: String, owner_id: UserId) -> Self {
        let now = super::timestamp();
        let mut members = HashMap::new();
        members.insert(owner_id, Role::Owner);
        Self {
            id,
            name,
            members,
            teams: BTreeMap::new(),
            default_team: None,
            integrations: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn role_of(&self, user_id: &str) -> Option<Role> {
        self.members.get(user_id).copied()
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.contains_key(user_id)
    }

    /// First team (by name) that lists the user.
    pub fn team_of(&self, user_id: &str) -> Option<&str> {
        self.teams
            .iter()
            .find(|(_, members)| members.iter().any(|m| m.user_id == user_id))
            .map(|(name, _)| name.as_str())
    }

    pub fn is_in_team(&self, team: &str, user_id: &str) -> bool {
        self.teams
            .get(team)
            .map(|members| members.iter().any(|m| m.user_id == user_id))
            .unwrap_or(false)
    }

    pub fn team_members(&self, team: &str) -> &[TeamMember] {
        self.teams.get(team).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, role)| **role == Role::Owner)
            .map(|(id, _)| id.as_str())
    }

    pub fn active_integration(&self, bot_token: &str) -> Option<&Integration> {
        self.integrations
            .iter()
            .find(|i| i.is_active && i.bot_token == bot_token)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub workspace_id: WorkspaceId,
    pub name: String,
}

impl CreateWorkspaceRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.workspace_id.trim().is_empty() {
            return Err("workspace_id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> Workspace {
        let mut ws = Workspace::new("WS1".into(), "Support".into(), "owner".into());
        ws.members.insert("agent".into(), Role::Member);
        ws.teams.insert(
            "triage".into(),
            vec![TeamMember {
                user_id: "agent".into(),
                status: UserStatus::Available,
            }],
        );
        ws
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Member < Role::Admin);
        assert!(Role::Admin < Role::Owner);
        assert!(Role::Owner.is_manager());
        assert!(!Role::Member.is_manager());
    }

    #[test]
    fn test_role_and_team_lookup() {
        let ws = workspace();
        assert_eq!(ws.role_of("owner"), Some(Role::Owner));
        assert_eq!(ws.role_of("agent"), Some(Role::Member));
        assert_eq!(ws.role_of("stranger"), None);
        assert_eq!(ws.team_of("agent"), Some("triage"));
        assert_eq!(ws.team_of("owner"), None);
        assert_eq!(ws.owner_id(), Some("owner"));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("on_break".parse::<UserStatus>(), Ok(UserStatus::OnBreak));
        assert_eq!("Available".parse::<UserStatus>(), Ok(UserStatus::Available));
        assert!("sleeping".parse::<UserStatus>().is_err());
    }

    #[test]
    fn test_integration_token_is_not_serialized() {
        let integration = Integration::new(
            "WS1".into(),
            TicketSource::TelegramBot,
            "BOT-T".into(),
            "https://example.com/hook".into(),
        );
        let json = serde_json::to_string(&integration).unwrap();
        assert!(!json.contains("BOT-T"));
    }
}
