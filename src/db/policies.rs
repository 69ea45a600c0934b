// Database queries for policies

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::db::pg_conn;
use crate::domain::repository::{PolicyRepository, StoreSession};
use crate::domain::{Method, Policy, Service};
use crate::errors::{AppError, Result};

#[derive(FromRow)]
struct PolicyRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    service: String,
    path: String,
    methods: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl PolicyRow {
    /// Rebuild the entity; stored enum values were validated on write, so
    /// a parse failure here means a corrupt row, not bad client input.
    fn into_policy(self, agent_ids: Vec<Uuid>) -> Result<Policy> {
        let service = Service::parse(&self.service).map_err(|_| {
            AppError::Internal(format!(
                "policy {} has unknown service {:?}",
                self.id, self.service
            ))
        })?;

        let mut methods = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            let method = Method::parse(method).ok_or_else(|| {
                AppError::Internal(format!(
                    "policy {} has unknown method {:?}",
                    self.id, method
                ))
            })?;
            methods.push(method);
        }

        Ok(Policy::restore(
            self.id,
            self.user_id,
            self.name,
            service,
            self.path,
            methods,
            agent_ids,
            self.created_at,
            self.updated_at,
            self.deleted_at,
        ))
    }
}

const SELECT_COLUMNS: &str =
    "id, user_id, name, service, path, methods, created_at, updated_at, deleted_at";

/// Materialize the associated agent-id set from the permission rows.
async fn load_agent_ids(conn: &mut PgConnection, policy_id: Uuid) -> Result<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT agent_id FROM permissions WHERE policy_id = $1 ORDER BY agent_id",
    )
    .bind(policy_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

fn method_names(policy: &Policy) -> Vec<String> {
    policy
        .methods()
        .iter()
        .map(|m| m.as_str().to_string())
        .collect()
}

pub struct PgPolicyRepository;

#[async_trait]
impl PolicyRepository for PgPolicyRepository {
    async fn create(&self, session: &mut dyn StoreSession, policy: &Policy) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            INSERT INTO policies (id, user_id, name, service, path, methods, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(policy.id())
        .bind(policy.user_id())
        .bind(policy.name())
        .bind(policy.service().as_str())
        .bind(policy.path())
        .bind(method_names(policy))
        .bind(policy.created_at())
        .bind(policy.updated_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn update(&self, session: &mut dyn StoreSession, policy: &Policy) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            UPDATE policies
            SET name = $3, service = $4, path = $5, methods = $6, updated_at = $7
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(policy.id())
        .bind(policy.user_id())
        .bind(policy.name())
        .bind(policy.service().as_str())
        .bind(policy.path())
        .bind(method_names(policy))
        .bind(policy.updated_at())
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
            UPDATE policies
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

    async fn find_by_id_and_user(
        &self,
        session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Policy>> {
        let conn = pg_conn(session)?;
        let row: Option<PolicyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM policies WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let agent_ids = load_agent_ids(conn, row.id).await?;
                Ok(Some(row.into_policy(agent_ids)?))
            }
            None => Ok(None),
        }
    }

    async fn find_by_user(
        &self,
        session: &mut dyn StoreSession,
        user_id: Uuid,
    ) -> Result<Vec<Policy>> {
        let conn = pg_conn(session)?;
        let rows: Vec<PolicyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM policies WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut policies = Vec::with_capacity(rows.len());
        for row in rows {
            let agent_ids = load_agent_ids(conn, row.id).await?;
            policies.push(row.into_policy(agent_ids)?);
        }
        Ok(policies)
    }

    async fn find_by_ids_and_user(
        &self,
        session: &mut dyn StoreSession,
        ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<Policy>> {
        let conn = pg_conn(session)?;
        let rows: Vec<PolicyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM policies WHERE id = ANY($1) AND user_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(ids)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut policies = Vec::with_capacity(rows.len());
        for row in rows {
            let agent_ids = load_agent_ids(conn, row.id).await?;
            policies.push(row.into_policy(agent_ids)?);
        }
        Ok(policies)
    }

    async fn find_by_user_and_name(
        &self,
        session: &mut dyn StoreSession,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<Policy>> {
        let conn = pg_conn(session)?;
        let row: Option<PolicyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM policies WHERE user_id = $1 AND name = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let agent_ids = load_agent_ids(conn, row.id).await?;
                Ok(Some(row.into_policy(agent_ids)?))
            }
            None => Ok(None),
        }
    }
}
