// Database queries for agent-policy permissions

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::pg_conn;
use crate::domain::repository::{PermissionRepository, StoreSession};
use crate::domain::Permission;
use crate::errors::Result;

/// Permission rows are replaced wholesale by the reconciliation use cases,
/// so deletes here are physical, not soft.
pub struct PgPermissionRepository;

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
    async fn create(
        &self,
        session: &mut dyn StoreSession,
        permission: &Permission,
    ) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            INSERT INTO permissions (id, agent_id, policy_id, effect, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(permission.id())
        .bind(permission.agent_id())
        .bind(permission.policy_id())
        .bind(permission.effect().as_str())
        .bind(permission.created_at())
        .bind(permission.updated_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn delete_by_agent(
        &self,
        session: &mut dyn StoreSession,
        agent_id: Uuid,
    ) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query("DELETE FROM permissions WHERE agent_id = $1")
            .bind(agent_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn delete_by_policy(
        &self,
        session: &mut dyn StoreSession,
        policy_id: Uuid,
    ) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query("DELETE FROM permissions WHERE policy_id = $1")
            .bind(policy_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
