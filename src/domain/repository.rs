// Persistence contracts consumed by the use-case layer
//
// One repository trait per entity, defined here and implemented once in
// `crate::db`. Every call takes the opaque transaction session handle so
// all writes of a use case share one transaction. Finders return
// `Ok(None)` for rows that are absent or soft-deleted for the given
// owner; only storage failures are errors.

use async_trait::async_trait;
use std::any::Any;
use uuid::Uuid;

use crate::domain::{Agent, AgentToken, Permission, Policy, User, UserToken};
use crate::errors::Result;

/// Opaque handle for one open transaction.
///
/// Repository implementations downcast it to their own session type;
/// nothing else inspects it. Dropping an uncommitted session rolls the
/// transaction back, including on panic.
pub trait StoreSession: Send {
    fn as_any(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Unit-of-work capability: every multi-step use case runs between one
/// `begin` and one `commit`.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreSession>>;
    async fn commit(&self, session: Box<dyn StoreSession>) -> Result<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, session: &mut dyn StoreSession, user: &User) -> Result<()>;
    async fn update(&self, session: &mut dyn StoreSession, user: &User) -> Result<()>;
    /// Soft-delete the user. Agents are cascaded separately, inside the
    /// same transaction, by the owning use case.
    async fn soft_delete(&self, session: &mut dyn StoreSession, id: Uuid) -> Result<()>;
    async fn find_by_id(&self, session: &mut dyn StoreSession, id: Uuid)
        -> Result<Option<User>>;
    async fn find_by_name(
        &self,
        session: &mut dyn StoreSession,
        name: &str,
    ) -> Result<Option<User>>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn create(&self, session: &mut dyn StoreSession, agent: &Agent) -> Result<()>;
    async fn update(&self, session: &mut dyn StoreSession, agent: &Agent) -> Result<()>;
    async fn soft_delete(
        &self,
        session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<()>;
    async fn soft_delete_by_user(
        &self,
        session: &mut dyn StoreSession,
        user_id: Uuid,
    ) -> Result<()>;
    async fn find_by_id_and_user(
        &self,
        session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Agent>>;
    async fn find_by_user(
        &self,
        session: &mut dyn StoreSession,
        user_id: Uuid,
    ) -> Result<Vec<Agent>>;
    async fn find_by_ids_and_user(
        &self,
        session: &mut dyn StoreSession,
        ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<Agent>>;
    async fn find_by_user_and_name(
        &self,
        session: &mut dyn StoreSession,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<Agent>>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn create(&self, session: &mut dyn StoreSession, policy: &Policy) -> Result<()>;
    async fn update(&self, session: &mut dyn StoreSession, policy: &Policy) -> Result<()>;
    async fn soft_delete(
        &self,
        session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<()>;
    async fn find_by_id_and_user(
        &self,
        session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Policy>>;
    async fn find_by_user(
        &self,
        session: &mut dyn StoreSession,
        user_id: Uuid,
    ) -> Result<Vec<Policy>>;
    async fn find_by_ids_and_user(
        &self,
        session: &mut dyn StoreSession,
        ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<Policy>>;
    async fn find_by_user_and_name(
        &self,
        session: &mut dyn StoreSession,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<Policy>>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn create(
        &self,
        session: &mut dyn StoreSession,
        permission: &Permission,
    ) -> Result<()>;
    async fn delete_by_agent(&self, session: &mut dyn StoreSession, agent_id: Uuid)
        -> Result<()>;
    async fn delete_by_policy(
        &self,
        session: &mut dyn StoreSession,
        policy_id: Uuid,
    ) -> Result<()>;
}

#[async_trait]
pub trait UserTokenRepository: Send + Sync {
    async fn create(&self, session: &mut dyn StoreSession, token: &UserToken) -> Result<()>;
    async fn delete_by_user(&self, session: &mut dyn StoreSession, user_id: Uuid) -> Result<()>;
    /// Expiry is evaluated against the storage clock; an expired token is
    /// indistinguishable from an absent one.
    async fn find_by_token_and_not_expired(
        &self,
        session: &mut dyn StoreSession,
        token: &str,
    ) -> Result<Option<UserToken>>;
}

#[async_trait]
pub trait AgentTokenRepository: Send + Sync {
    async fn create(&self, session: &mut dyn StoreSession, token: &AgentToken) -> Result<()>;
    async fn delete_by_agent(&self, session: &mut dyn StoreSession, agent_id: Uuid)
        -> Result<()>;
    async fn find_by_agent(
        &self,
        session: &mut dyn StoreSession,
        agent_id: Uuid,
    ) -> Result<Option<AgentToken>>;
}
