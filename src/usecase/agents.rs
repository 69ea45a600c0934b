// Agent use cases

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::repository::{
    AgentRepository, AgentTokenRepository, PermissionRepository, PolicyRepository,
    TransactionManager,
};
use crate::domain::{Agent, AgentToken, Effect, Permission, Policy};
use crate::errors::{AppError, Result};

/// CRUD, token lifecycle, and policy-set reconciliation for agents.
pub struct AgentUsecase {
    tx: Arc<dyn TransactionManager>,
    agents: Arc<dyn AgentRepository>,
    policies: Arc<dyn PolicyRepository>,
    permissions: Arc<dyn PermissionRepository>,
    agent_tokens: Arc<dyn AgentTokenRepository>,
}

impl AgentUsecase {
    pub fn new(
        tx: Arc<dyn TransactionManager>,
        agents: Arc<dyn AgentRepository>,
        policies: Arc<dyn PolicyRepository>,
        permissions: Arc<dyn PermissionRepository>,
        agent_tokens: Arc<dyn AgentTokenRepository>,
    ) -> Self {
        Self {
            tx,
            agents,
            policies,
            permissions,
            agent_tokens,
        }
    }

    pub async fn create(&self, user_id: Uuid, name: &str) -> Result<Agent> {
        let agent = Agent::new(user_id, name)?;

        let mut session = self.tx.begin().await?;
        if self
            .agents
            .find_by_user_and_name(session.as_mut(), user_id, name)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!("agent {} already exists", name)));
        }
        self.agents.create(session.as_mut(), &agent).await?;
        self.tx.commit(session).await?;

        tracing::info!(agent_id = %agent.id(), user_id = %user_id, "agent created");
        Ok(agent)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Agent>> {
        let mut session = self.tx.begin().await?;
        let agents = self.agents.find_by_user(session.as_mut(), user_id).await?;
        self.tx.commit(session).await?;

        Ok(agents)
    }

    pub async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Agent> {
        let mut session = self.tx.begin().await?;
        let agent = self
            .agents
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("agent"))?;
        self.tx.commit(session).await?;

        Ok(agent)
    }

    pub async fn rename(&self, id: Uuid, user_id: Uuid, name: &str) -> Result<Agent> {
        let mut session = self.tx.begin().await?;
        let mut agent = self
            .agents
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("agent"))?;
        agent.set_name(name)?;
        self.agents.update(session.as_mut(), &agent).await?;
        self.tx.commit(session).await?;

        tracing::info!(agent_id = %agent.id(), "agent renamed");
        Ok(agent)
    }

    /// Replace the agent's policy associations with the given target set.
    ///
    /// The permission rows for the agent are deleted and re-inserted in the
    /// same transaction as the agent update. Any target id that does not
    /// resolve to a live policy of the same user fails the whole operation.
    pub async fn update_policies(
        &self,
        id: Uuid,
        user_id: Uuid,
        policy_ids: &[Uuid],
    ) -> Result<Agent> {
        let mut session = self.tx.begin().await?;
        let mut agent = self
            .agents
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("agent"))?;

        agent.set_policies(policy_ids);
        if !agent.policy_ids().is_empty() {
            let found = self
                .policies
                .find_by_ids_and_user(session.as_mut(), agent.policy_ids(), user_id)
                .await?;
            if found.len() != agent.policy_ids().len() {
                return Err(AppError::NotFound("policy"));
            }
        }

        self.agents.update(session.as_mut(), &agent).await?;
        self.permissions
            .delete_by_agent(session.as_mut(), agent.id())
            .await?;
        for policy_id in agent.policy_ids() {
            let permission = Permission::new(agent.id(), *policy_id, Effect::Allow.as_str())?;
            self.permissions.create(session.as_mut(), &permission).await?;
        }
        self.tx.commit(session).await?;

        tracing::info!(
            agent_id = %agent.id(),
            policies = agent.policy_ids().len(),
            "agent policies replaced"
        );
        Ok(agent)
    }

    /// Resolve the agent's associated policies, in the same transaction as
    /// the agent load for a consistent snapshot.
    pub async fn get_policies(&self, id: Uuid, user_id: Uuid) -> Result<Vec<Policy>> {
        let mut session = self.tx.begin().await?;
        let agent = self
            .agents
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("agent"))?;
        let policies = if agent.policy_ids().is_empty() {
            Vec::new()
        } else {
            self.policies
                .find_by_ids_and_user(session.as_mut(), agent.policy_ids(), user_id)
                .await?
        };
        self.tx.commit(session).await?;

        Ok(policies)
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let mut session = self.tx.begin().await?;
        let agent = self
            .agents
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("agent"))?;
        self.agents
            .soft_delete(session.as_mut(), agent.id(), user_id)
            .await?;
        self.tx.commit(session).await?;

        tracing::info!(agent_id = %id, "agent deleted");
        Ok(())
    }

    /// Issue a long-lived token for the agent, replacing any existing one.
    pub async fn issue_token(&self, id: Uuid, user_id: Uuid) -> Result<AgentToken> {
        let mut session = self.tx.begin().await?;
        let agent = self
            .agents
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("agent"))?;

        self.agent_tokens
            .delete_by_agent(session.as_mut(), agent.id())
            .await?;
        let token = AgentToken::issue(agent.id())?;
        self.agent_tokens.create(session.as_mut(), &token).await?;
        self.tx.commit(session).await?;

        tracing::info!(agent_id = %agent.id(), "agent token issued");
        Ok(token)
    }

    pub async fn get_token(&self, id: Uuid, user_id: Uuid) -> Result<AgentToken> {
        let mut session = self.tx.begin().await?;
        let agent = self
            .agents
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("agent"))?;
        let token = self
            .agent_tokens
            .find_by_agent(session.as_mut(), agent.id())
            .await?
            .ok_or(AppError::NotFound("agent token"))?;
        self.tx.commit(session).await?;

        Ok(token)
    }

    pub async fn delete_token(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let mut session = self.tx.begin().await?;
        let agent = self
            .agents
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("agent"))?;
        self.agent_tokens
            .delete_by_agent(session.as_mut(), agent.id())
            .await?;
        self.tx.commit(session).await?;

        tracing::info!(agent_id = %id, "agent token deleted");
        Ok(())
    }
}
