// Database queries for agents

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::db::pg_conn;
use crate::domain::repository::{AgentRepository, StoreSession};
use crate::domain::Agent;
use crate::errors::Result;

#[derive(FromRow)]
struct AgentRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl AgentRow {
    fn into_agent(self, policy_ids: Vec<Uuid>) -> Agent {
        Agent::restore(
            self.id,
            self.user_id,
            self.name,
            policy_ids,
            self.created_at,
            self.updated_at,
            self.deleted_at,
        )
    }
}

const SELECT_COLUMNS: &str = "id, user_id, name, created_at, updated_at, deleted_at";

/// Materialize the associated policy-id set from the permission rows.
async fn load_policy_ids(conn: &mut PgConnection, agent_id: Uuid) -> Result<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT policy_id FROM permissions WHERE agent_id = $1 ORDER BY policy_id",
    )
    .bind(agent_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

pub struct PgAgentRepository;

#[async_trait]
impl AgentRepository for PgAgentRepository {
    async fn create(&self, session: &mut dyn StoreSession, agent: &Agent) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            INSERT INTO agents (id, user_id, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(agent.id())
        .bind(agent.user_id())
        .bind(agent.name())
        .bind(agent.created_at())
        .bind(agent.updated_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn update(&self, session: &mut dyn StoreSession, agent: &Agent) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            UPDATE agents
            SET name = $3, updated_at = $4
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(agent.id())
        .bind(agent.user_id())
        .bind(agent.name())
        .bind(agent.updated_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn soft_delete(
        &self,
        session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            UPDATE agents
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn soft_delete_by_user(
        &self,
        session: &mut dyn StoreSession,
        user_id: Uuid,
    ) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            UPDATE agents
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn find_by_id_and_user(
        &self,
        session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Agent>> {
        let conn = pg_conn(session)?;
        let row: Option<AgentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM agents WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let policy_ids = load_policy_ids(conn, row.id).await?;
                Ok(Some(row.into_agent(policy_ids)))
            }
            None => Ok(None),
        }
    }

    async fn find_by_user(
        &self,
        session: &mut dyn StoreSession,
        user_id: Uuid,
    ) -> Result<Vec<Agent>> {
        let conn = pg_conn(session)?;
        let rows: Vec<AgentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM agents WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        // Association sets are small; one lookup per agent is fine here.
        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            let policy_ids = load_policy_ids(conn, row.id).await?;
            agents.push(row.into_agent(policy_ids));
        }
        Ok(agents)
    }

    async fn find_by_ids_and_user(
        &self,
        session: &mut dyn StoreSession,
        ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<Agent>> {
        let conn = pg_conn(session)?;
        let rows: Vec<AgentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM agents WHERE id = ANY($1) AND user_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(ids)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            let policy_ids = load_policy_ids(conn, row.id).await?;
            agents.push(row.into_agent(policy_ids));
        }
        Ok(agents)
    }

    async fn find_by_user_and_name(
        &self,
        session: &mut dyn StoreSession,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<Agent>> {
        let conn = pg_conn(session)?;
        let row: Option<AgentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM agents WHERE user_id = $1 AND name = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let policy_ids = load_policy_ids(conn, row.id).await?;
                Ok(Some(row.into_agent(policy_ids)))
            }
            None => Ok(None),
        }
    }
}
