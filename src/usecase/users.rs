// User account use cases

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::repository::{
    AgentRepository, TransactionManager, UserRepository, UserTokenRepository,
};
use crate::domain::{User, UserToken};
use crate::errors::{AppError, Result};

/// Sign-up, credential, and token lifecycle operations for users.
///
/// Every operation runs between one `begin` and one `commit`; an early
/// return drops the session and rolls the transaction back.
pub struct UserUsecase {
    tx: Arc<dyn TransactionManager>,
    users: Arc<dyn UserRepository>,
    agents: Arc<dyn AgentRepository>,
    user_tokens: Arc<dyn UserTokenRepository>,
}

impl UserUsecase {
    pub fn new(
        tx: Arc<dyn TransactionManager>,
        users: Arc<dyn UserRepository>,
        agents: Arc<dyn AgentRepository>,
        user_tokens: Arc<dyn UserTokenRepository>,
    ) -> Self {
        Self {
            tx,
            users,
            agents,
            user_tokens,
        }
    }

    /// Create an account from a display name and confirmed password.
    pub async fn sign_up(&self, name: &str, password: &str, confirm: &str) -> Result<User> {
        let user = User::new(name, password, confirm)?;

        let mut session = self.tx.begin().await?;
        if self
            .users
            .find_by_name(session.as_mut(), name)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!("user {} already exists", name)));
        }
        self.users.create(session.as_mut(), &user).await?;
        self.tx.commit(session).await?;

        tracing::info!(user_id = %user.id(), "user signed up");
        Ok(user)
    }

    /// Exchange credentials for a fresh bearer token, replacing any token
    /// the user already holds.
    pub async fn sign_in(&self, name: &str, password: &str) -> Result<UserToken> {
        let mut session = self.tx.begin().await?;
        let user = self
            .users
            .find_by_name(session.as_mut(), name)
            .await?
            .ok_or(AppError::AuthenticationFailed)?;
        user.verify_password(password)?;

        self.user_tokens
            .delete_by_user(session.as_mut(), user.id())
            .await?;
        let token = UserToken::issue(user.id())?;
        self.user_tokens.create(session.as_mut(), &token).await?;
        self.tx.commit(session).await?;

        tracing::info!(user_id = %user.id(), "user signed in");
        Ok(token)
    }

    /// Resolve a bearer token to its live, non-deleted user.
    ///
    /// Unknown, expired, and orphaned tokens all fail the same way.
    pub async fn verify_token(&self, token: &str) -> Result<User> {
        let mut session = self.tx.begin().await?;
        let token = self
            .user_tokens
            .find_by_token_and_not_expired(session.as_mut(), token)
            .await?
            .ok_or(AppError::AuthenticationFailed)?;
        let user = self
            .users
            .find_by_id(session.as_mut(), token.user_id())
            .await?
            .ok_or(AppError::AuthenticationFailed)?;
        self.tx.commit(session).await?;

        Ok(user)
    }

    /// Delete the user's active token.
    pub async fn sign_out(&self, user_id: Uuid) -> Result<()> {
        let mut session = self.tx.begin().await?;
        self.user_tokens
            .delete_by_user(session.as_mut(), user_id)
            .await?;
        self.tx.commit(session).await?;

        tracing::info!(user_id = %user_id, "user signed out");
        Ok(())
    }

    /// Re-hash the user's password from a new confirmed plaintext.
    pub async fn update_password(
        &self,
        user_id: Uuid,
        password: &str,
        confirm: &str,
    ) -> Result<User> {
        let mut session = self.tx.begin().await?;
        let mut user = self
            .users
            .find_by_id(session.as_mut(), user_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        user.set_password(password, confirm)?;
        self.users.update(session.as_mut(), &user).await?;
        self.tx.commit(session).await?;

        tracing::info!(user_id = %user.id(), "user password updated");
        Ok(user)
    }

    /// Soft-delete the user, cascading to the user's agents inside the
    /// same transaction.
    pub async fn delete(&self, user_id: Uuid) -> Result<()> {
        let mut session = self.tx.begin().await?;
        let user = self
            .users
            .find_by_id(session.as_mut(), user_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        self.users.soft_delete(session.as_mut(), user.id()).await?;
        self.agents
            .soft_delete_by_user(session.as_mut(), user.id())
            .await?;
        self.tx.commit(session).await?;

        tracing::info!(user_id = %user_id, "user deleted");
        Ok(())
    }
}
