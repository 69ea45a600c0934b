// Policy use cases

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::repository::{
    AgentRepository, PermissionRepository, PolicyRepository, TransactionManager,
};
use crate::domain::{Agent, Effect, Permission, Policy};
use crate::errors::{AppError, Result};

/// Optional field updates for a policy; `None` leaves a field untouched.
#[derive(Debug, Default, Clone)]
pub struct PolicyUpdate {
    pub name: Option<String>,
    pub service: Option<String>,
    pub path: Option<String>,
    pub methods: Option<Vec<String>>,
}

/// CRUD and agent-set reconciliation for policies.
pub struct PolicyUsecase {
    tx: Arc<dyn TransactionManager>,
    policies: Arc<dyn PolicyRepository>,
    agents: Arc<dyn AgentRepository>,
    permissions: Arc<dyn PermissionRepository>,
}

impl PolicyUsecase {
    pub fn new(
        tx: Arc<dyn TransactionManager>,
        policies: Arc<dyn PolicyRepository>,
        agents: Arc<dyn AgentRepository>,
        permissions: Arc<dyn PermissionRepository>,
    ) -> Self {
        Self {
            tx,
            policies,
            agents,
            permissions,
        }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        service: &str,
        path: &str,
        methods: &[String],
    ) -> Result<Policy> {
        let policy = Policy::new(user_id, name, service, path, methods)?;

        let mut session = self.tx.begin().await?;
        if self
            .policies
            .find_by_user_and_name(session.as_mut(), user_id, name)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "policy {} already exists",
                name
            )));
        }
        self.policies.create(session.as_mut(), &policy).await?;
        self.tx.commit(session).await?;

        tracing::info!(policy_id = %policy.id(), user_id = %user_id, "policy created");
        Ok(policy)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Policy>> {
        let mut session = self.tx.begin().await?;
        let policies = self.policies.find_by_user(session.as_mut(), user_id).await?;
        self.tx.commit(session).await?;

        Ok(policies)
    }

    pub async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Policy> {
        let mut session = self.tx.begin().await?;
        let policy = self
            .policies
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("policy"))?;
        self.tx.commit(session).await?;

        Ok(policy)
    }

    /// Apply the provided field updates through the entity setters, in a
    /// fixed order. The first validation failure aborts with nothing
    /// persisted.
    pub async fn update(&self, id: Uuid, user_id: Uuid, update: PolicyUpdate) -> Result<Policy> {
        let mut session = self.tx.begin().await?;
        let mut policy = self
            .policies
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("policy"))?;

        if let Some(name) = &update.name {
            policy.set_name(name)?;
        }
        if let Some(service) = &update.service {
            policy.set_service(service)?;
        }
        if let Some(path) = &update.path {
            policy.set_path(path)?;
        }
        if let Some(methods) = &update.methods {
            policy.set_methods(methods)?;
        }

        self.policies.update(session.as_mut(), &policy).await?;
        self.tx.commit(session).await?;

        tracing::info!(policy_id = %policy.id(), "policy updated");
        Ok(policy)
    }

    /// Replace the policy's agent associations with the given target set.
    ///
    /// Mirrors `AgentUsecase::update_policies` from the other side of the
    /// join: delete all permission rows for the policy, insert one per
    /// target agent, all in the transaction that persists the policy.
    pub async fn update_agents(
        &self,
        id: Uuid,
        user_id: Uuid,
        agent_ids: &[Uuid],
    ) -> Result<Policy> {
        let mut session = self.tx.begin().await?;
        let mut policy = self
            .policies
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("policy"))?;

        policy.set_agents(agent_ids);
        if !policy.agent_ids().is_empty() {
            let found = self
                .agents
                .find_by_ids_and_user(session.as_mut(), policy.agent_ids(), user_id)
                .await?;
            if found.len() != policy.agent_ids().len() {
                return Err(AppError::NotFound("agent"));
            }
        }

        self.policies.update(session.as_mut(), &policy).await?;
        self.permissions
            .delete_by_policy(session.as_mut(), policy.id())
            .await?;
        for agent_id in policy.agent_ids() {
            let permission = Permission::new(*agent_id, policy.id(), Effect::Allow.as_str())?;
            self.permissions.create(session.as_mut(), &permission).await?;
        }
        self.tx.commit(session).await?;

        tracing::info!(
            policy_id = %policy.id(),
            agents = policy.agent_ids().len(),
            "policy agents replaced"
        );
        Ok(policy)
    }

    /// Resolve the policy's associated agents within one snapshot.
    pub async fn get_agents(&self, id: Uuid, user_id: Uuid) -> Result<Vec<Agent>> {
        let mut session = self.tx.begin().await?;
        let policy = self
            .policies
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("policy"))?;
        let agents = if policy.agent_ids().is_empty() {
            Vec::new()
        } else {
            self.agents
                .find_by_ids_and_user(session.as_mut(), policy.agent_ids(), user_id)
                .await?
        };
        self.tx.commit(session).await?;

        Ok(agents)
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let mut session = self.tx.begin().await?;
        let policy = self
            .policies
            .find_by_id_and_user(session.as_mut(), id, user_id)
            .await?
            .ok_or(AppError::NotFound("policy"))?;
        self.policies
            .soft_delete(session.as_mut(), policy.id(), user_id)
            .await?;
        self.tx.commit(session).await?;

        tracing::info!(policy_id = %id, "policy deleted");
        Ok(())
    }
}
