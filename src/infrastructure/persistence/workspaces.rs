use crate::domain::entities::{timestamp, Integration, Role, TeamMember, UserStatus, Workspace};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::workspace_repository::WorkspaceRepository;
use crate::infrastructure::persistence::{bool_to_int, Database};
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::Row;
use std::collections::{BTreeMap, HashMap};

const INTEGRATION_COLUMNS: &str =
    "id, workspace_id, source, bot_token, webhook_url, is_active, created_at, updated_at";

fn integration_from_row(row: &AnyRow) -> DomainResult<Integration> {
    let source: String = row.try_get("source")?;
    Ok(Integration {
        id: row.try_get("id")?,
        workspace_id: row.try_get("workspace_id")?,
        source: source.parse().map_err(DomainError::Internal)?,
        bot_token: row.try_get("bot_token")?,
        webhook_url: row.try_get("webhook_url")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// Internal helpers
impl Database {
    async fn load_members(&self, workspace_id: &str) -> DomainResult<HashMap<String, Role>> {
        let rows = sqlx::query("SELECT user_id, role FROM workspace_members WHERE workspace_id = ?")
            .bind(workspace_id)
            .fetch_all(&self.pool)
            .await?;

        let mut members = HashMap::with_capacity(rows.len());
        for row in rows {
            let role: String = row.try_get("role")?;
            members.insert(
                row.try_get("user_id")?,
                role.parse().map_err(DomainError::Internal)?,
            );
        }
        Ok(members)
    }

    async fn load_teams(
        &self,
        workspace_id: &str,
    ) -> DomainResult<BTreeMap<String, Vec<TeamMember>>> {
        let rows = sqlx::query(
            "SELECT team_name, user_id, status FROM team_members
             WHERE workspace_id = ?
             ORDER BY team_name, user_id",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        let mut teams: BTreeMap<String, Vec<TeamMember>> = BTreeMap::new();
        for row in rows {
            let status: String = row.try_get("status")?;
            teams
                .entry(row.try_get("team_name")?)
                .or_default()
                .push(TeamMember {
                    user_id: row.try_get("user_id")?,
                    status: status.parse().map_err(DomainError::Internal)?,
                });
        }
        Ok(teams)
    }

    async fn load_integrations(&self, workspace_id: &str) -> DomainResult<Vec<Integration>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM integrations WHERE workspace_id = ? ORDER BY created_at",
            INTEGRATION_COLUMNS
        ))
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(integration_from_row).collect()
    }

    async fn touch_workspace(&self, workspace_id: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE workspaces SET updated_at = ? WHERE id = ?")
            .bind(timestamp())
            .bind(workspace_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "Workspace {} not found",
                workspace_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkspaceRepository for Database {
    async fn get_workspace(&self, id: &str) -> DomainResult<Option<Workspace>> {
        let row = sqlx::query(
            "SELECT id, name, default_team, created_at, updated_at FROM workspaces WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Workspace {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            members: self.load_members(id).await?,
            teams: self.load_teams(id).await?,
            default_team: row.try_get("default_team")?,
            integrations: self.load_integrations(id).await?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn create_workspace(&self, workspace: &Workspace, owner_id: &str) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO workspaces (id, name, default_team, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&workspace.id)
        .bind(&workspace.name)
        .bind(&workspace.default_team)
        .bind(&workspace.created_at)
        .bind(&workspace.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DomainError::from(e) {
            DomainError::Conflict(_) => {
                DomainError::Conflict(format!("Workspace {} already exists", workspace.id))
            }
            other => other,
        })?;

        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, joined_at)
             VALUES (?, ?, 'owner', ?)",
        )
        .bind(&workspace.id)
        .bind(owner_id)
        .bind(&workspace.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn rename_workspace(&self, id: &str, name: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE workspaces SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("Workspace {} not found", id)));
        }
        Ok(())
    }

    async fn delete_workspace(&self, id: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("Workspace {} not found", id)));
        }
        Ok(())
    }

    async fn upsert_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: Role,
    ) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, joined_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (workspace_id, user_id) DO UPDATE SET role = excluded.role",
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(timestamp())
        .execute(&self.pool)
        .await?;

        self.touch_workspace(workspace_id).await
    }

    async fn remove_member(&self, workspace_id: &str, user_id: &str) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("DELETE FROM workspace_members WHERE workspace_id = ? AND user_id = ?")
                .bind(workspace_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "User {} is not a member of workspace {}",
                user_id, workspace_id
            )));
        }

        // Assignees must stay workspace members.
        sqlx::query(
            "UPDATE tickets SET assigned_to = NULL, updated_at = ?
             WHERE workspace_id = ? AND assigned_to = ?",
        )
        .bind(timestamp())
        .bind(workspace_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.touch_workspace(workspace_id).await
    }

    async fn upsert_team_member(
        &self,
        workspace_id: &str,
        team: &str,
        user_id: &str,
        status: UserStatus,
    ) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO team_members (workspace_id, team_name, user_id, status)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (workspace_id, team_name, user_id) DO UPDATE SET status = excluded.status",
        )
        .bind(workspace_id)
        .bind(team)
        .bind(user_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        self.touch_workspace(workspace_id).await
    }

    async fn remove_team_member(
        &self,
        workspace_id: &str,
        team: &str,
        user_id: &str,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            "DELETE FROM team_members WHERE workspace_id = ? AND team_name = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(team)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "User {} is not in team {}",
                user_id, team
            )));
        }
        self.touch_workspace(workspace_id).await
    }

    async fn set_member_status(
        &self,
        workspace_id: &str,
        user_id: &str,
        status: UserStatus,
    ) -> DomainResult<u64> {
        let result =
            sqlx::query("UPDATE team_members SET status = ? WHERE workspace_id = ? AND user_id = ?")
                .bind(status.as_str())
                .bind(workspace_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn set_default_team(&self, workspace_id: &str, team: Option<&str>) -> DomainResult<()> {
        let result =
            sqlx::query("UPDATE workspaces SET default_team = ?, updated_at = ? WHERE id = ?")
                .bind(team)
                .bind(timestamp())
                .bind(workspace_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "Workspace {} not found",
                workspace_id
            )));
        }
        Ok(())
    }

    async fn find_integration_by_bot_token(
        &self,
        bot_token: &str,
    ) -> DomainResult<Option<Integration>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM integrations WHERE bot_token = ?",
            INTEGRATION_COLUMNS
        ))
        .bind(bot_token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(integration_from_row).transpose()
    }

    async fn save_integration(&self, integration: &Integration) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        // Inactive bindings anywhere and any binding in the target workspace are replaced.
        // An active binding in another workspace survives and trips the unique index.
        sqlx::query("DELETE FROM integrations WHERE bot_token = ? AND (is_active = 0 OR workspace_id = ?)")
            .bind(&integration.bot_token)
            .bind(&integration.workspace_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO integrations (id, workspace_id, source, bot_token, webhook_url, is_active,
                                       created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&integration.id)
        .bind(&integration.workspace_id)
        .bind(integration.source.as_str())
        .bind(&integration.bot_token)
        .bind(&integration.webhook_url)
        .bind(bool_to_int(integration.is_active))
        .bind(&integration.created_at)
        .bind(&integration.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DomainError::from(e) {
            DomainError::Conflict(_) => DomainError::Conflict(
                "Bot credential is already bound to another workspace".to_string(),
            ),
            other => other,
        })?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_integration_active(&self, integration_id: &str, active: bool) -> DomainResult<()> {
        let result =
            sqlx::query("UPDATE integrations SET is_active = ?, updated_at = ? WHERE id = ?")
                .bind(bool_to_int(active))
                .bind(timestamp())
                .bind(integration_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "Integration {} not found",
                integration_id
            )));
        }
        Ok(())
    }
}

