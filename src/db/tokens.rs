// Database queries for user and agent tokens

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::pg_conn;
use crate::domain::repository::{AgentTokenRepository, StoreSession, UserTokenRepository};
use crate::domain::{AgentToken, UserToken};
use crate::errors::Result;

#[derive(FromRow)]
struct UserTokenRow {
    id: Uuid,
    user_id: Uuid,
    token: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<UserTokenRow> for UserToken {
    fn from(row: UserTokenRow) -> Self {
        UserToken::restore(row.id, row.user_id, row.token, row.expires_at, row.created_at)
    }
}

pub struct PgUserTokenRepository;

#[async_trait]
impl UserTokenRepository for PgUserTokenRepository {
    async fn create(&self, session: &mut dyn StoreSession, token: &UserToken) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            INSERT INTO user_tokens (id, user_id, token, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.id())
        .bind(token.user_id())
        .bind(token.token())
        .bind(token.expires_at())
        .bind(token.created_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn delete_by_user(&self, session: &mut dyn StoreSession, user_id: Uuid) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query("DELETE FROM user_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn find_by_token_and_not_expired(
        &self,
        session: &mut dyn StoreSession,
        token: &str,
    ) -> Result<Option<UserToken>> {
        let conn = pg_conn(session)?;
        // Expiry is checked against the database clock, and an expired
        // token reads the same as an absent one.
        let row: Option<UserTokenRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, token, expires_at, created_at
            FROM user_tokens
            WHERE token = $1 AND expires_at > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(UserToken::from))
    }
}

#[derive(FromRow)]
struct AgentTokenRow {
    id: Uuid,
    agent_id: Uuid,
    token: String,
    generated_at: DateTime<Utc>,
}

impl From<AgentTokenRow> for AgentToken {
    fn from(row: AgentTokenRow) -> Self {
        AgentToken::restore(row.id, row.agent_id, row.token, row.generated_at)
    }
}

pub struct PgAgentTokenRepository;

#[async_trait]
impl AgentTokenRepository for PgAgentTokenRepository {
    async fn create(&self, session: &mut dyn StoreSession, token: &AgentToken) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            INSERT INTO agent_tokens (id, agent_id, token, generated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token.id())
        .bind(token.agent_id())
        .bind(token.token())
        .bind(token.generated_at())
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
        sqlx::query("DELETE FROM agent_tokens WHERE agent_id = $1")
            .bind(agent_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn find_by_agent(
        &self,
        session: &mut dyn StoreSession,
        agent_id: Uuid,
    ) -> Result<Option<AgentToken>> {
        let conn = pg_conn(session)?;
        let row: Option<AgentTokenRow> = sqlx::query_as(
            r#"
            SELECT id, agent_id, token, generated_at
            FROM agent_tokens
            WHERE agent_id = $1
            "#,
        )
        .bind(agent_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(AgentToken::from))
    }
}
