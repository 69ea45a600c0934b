// Database queries for users

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::pg_conn;
use crate::domain::repository::{StoreSession, UserRepository};
use crate::domain::User;
use crate::errors::Result;

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::restore(
            row.id,
            row.name,
            row.password_hash,
            row.created_at,
            row.updated_at,
            row.deleted_at,
        )
    }
}

const SELECT_COLUMNS: &str = "id, name, password_hash, created_at, updated_at, deleted_at";

pub struct PgUserRepository;

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, session: &mut dyn StoreSession, user: &User) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            INSERT INTO users (id, name, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id())
        .bind(user.name())
        .bind(user.password_hash())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn update(&self, session: &mut dyn StoreSession, user: &User) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            UPDATE users
            SET name = $2, password_hash = $3, updated_at = $4
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user.id())
        .bind(user.name())
        .bind(user.password_hash())
        .bind(user.updated_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn soft_delete(&self, session: &mut dyn StoreSession, id: Uuid) -> Result<()> {
        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        session: &mut dyn StoreSession,
        id: Uuid,
    ) -> Result<Option<User>> {
        let conn = pg_conn(session)?;
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_name(
        &self,
        session: &mut dyn StoreSession,
        name: &str,
    ) -> Result<Option<User>> {
        let conn = pg_conn(session)?;
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE name = $1 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(User::from))
    }
}
