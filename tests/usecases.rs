// Use-case scenarios over an in-memory store.
//
// The fakes implement the same repository and transaction contracts as the
// PostgreSQL adapter. `begin` snapshots the shared state and dropping a
// session without commit restores the snapshot, so rollback semantics match
// the real adapter's drop-path behavior.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use agent_gate::domain::repository::{
    AgentRepository, AgentTokenRepository, PermissionRepository, PolicyRepository, StoreSession,
    TransactionManager, UserRepository, UserTokenRepository,
};
use agent_gate::domain::{Agent, AgentToken, Effect, Permission, Policy, User, UserToken};
use agent_gate::errors::{AppError, Result};
use agent_gate::usecase::{AgentUsecase, PolicyUpdate, PolicyUsecase, UserUsecase};

#[derive(Default, Clone)]
struct StoreState {
    users: HashMap<Uuid, User>,
    agents: HashMap<Uuid, Agent>,
    policies: HashMap<Uuid, Policy>,
    permissions: Vec<Permission>,
    user_tokens: Vec<UserToken>,
    agent_tokens: Vec<AgentToken>,
}

struct MemSession {
    state: Arc<Mutex<StoreState>>,
    snapshot: Option<StoreState>,
    committed: bool,
}

impl StoreSession for MemSession {
    fn as_any(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl Drop for MemSession {
    fn drop(&mut self) {
        if !self.committed {
            if let Some(snapshot) = self.snapshot.take() {
                *self.state.lock().unwrap() = snapshot;
            }
        }
    }
}

struct MemTransactionManager {
    state: Arc<Mutex<StoreState>>,
}

#[async_trait]
impl TransactionManager for MemTransactionManager {
    async fn begin(&self) -> Result<Box<dyn StoreSession>> {
        let snapshot = self.state.lock().unwrap().clone();
        Ok(Box::new(MemSession {
            state: self.state.clone(),
            snapshot: Some(snapshot),
            committed: false,
        }))
    }

    async fn commit(&self, session: Box<dyn StoreSession>) -> Result<()> {
        let mut session = session
            .into_any()
            .downcast::<MemSession>()
            .map_err(|_| AppError::Internal("commit requires a mem session".to_string()))?;
        session.committed = true;
        Ok(())
    }
}

/// One struct implements every repository contract over the shared state.
/// The session handle is ignored; writes go straight to the state the
/// transaction manager snapshots.
#[derive(Clone)]
struct MemStore {
    state: Arc<Mutex<StoreState>>,
}

/// Association ids live in the permission rows, as in the real adapter.
fn hydrate_agent(state: &StoreState, agent: &Agent) -> Agent {
    let mut policy_ids: Vec<Uuid> = state
        .permissions
        .iter()
        .filter(|p| p.agent_id() == agent.id())
        .map(|p| p.policy_id())
        .collect();
    policy_ids.sort();
    Agent::restore(
        agent.id(),
        agent.user_id(),
        agent.name().to_string(),
        policy_ids,
        agent.created_at(),
        agent.updated_at(),
        agent.deleted_at(),
    )
}

fn hydrate_policy(state: &StoreState, policy: &Policy) -> Policy {
    let mut agent_ids: Vec<Uuid> = state
        .permissions
        .iter()
        .filter(|p| p.policy_id() == policy.id())
        .map(|p| p.agent_id())
        .collect();
    agent_ids.sort();
    Policy::restore(
        policy.id(),
        policy.user_id(),
        policy.name().to_string(),
        policy.service(),
        policy.path().to_string(),
        policy.methods().to_vec(),
        agent_ids,
        policy.created_at(),
        policy.updated_at(),
        policy.deleted_at(),
    )
}

#[async_trait]
impl UserRepository for MemStore {
    async fn create(&self, _session: &mut dyn StoreSession, user: &User) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn update(&self, _session: &mut dyn StoreSession, user: &User) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.users.get_mut(&user.id()) {
            if existing.deleted_at().is_none() {
                *existing = user.clone();
            }
        }
        Ok(())
    }

    async fn soft_delete(&self, _session: &mut dyn StoreSession, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.get(&id).cloned() {
            if user.deleted_at().is_none() {
                let now = Utc::now();
                state.users.insert(
                    id,
                    User::restore(
                        user.id(),
                        user.name().to_string(),
                        user.password_hash().to_string(),
                        user.created_at(),
                        now,
                        Some(now),
                    ),
                );
            }
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        _session: &mut dyn StoreSession,
        id: Uuid,
    ) -> Result<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .get(&id)
            .filter(|u| u.deleted_at().is_none())
            .cloned())
    }

    async fn find_by_name(
        &self,
        _session: &mut dyn StoreSession,
        name: &str,
    ) -> Result<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .values()
            .find(|u| u.name() == name && u.deleted_at().is_none())
            .cloned())
    }
}

#[async_trait]
impl AgentRepository for MemStore {
    async fn create(&self, _session: &mut dyn StoreSession, agent: &Agent) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.agents.insert(agent.id(), agent.clone());
        Ok(())
    }

    async fn update(&self, _session: &mut dyn StoreSession, agent: &Agent) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.agents.get_mut(&agent.id()) {
            if existing.deleted_at().is_none() {
                *existing = agent.clone();
            }
        }
        Ok(())
    }

    async fn soft_delete(
        &self,
        _session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(agent) = state.agents.get(&id).cloned() {
            if agent.user_id() == user_id && agent.deleted_at().is_none() {
                let now = Utc::now();
                state.agents.insert(
                    id,
                    Agent::restore(
                        agent.id(),
                        agent.user_id(),
                        agent.name().to_string(),
                        agent.policy_ids().to_vec(),
                        agent.created_at(),
                        now,
                        Some(now),
                    ),
                );
            }
        }
        Ok(())
    }

    async fn soft_delete_by_user(
        &self,
        _session: &mut dyn StoreSession,
        user_id: Uuid,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let ids: Vec<Uuid> = state
            .agents
            .values()
            .filter(|a| a.user_id() == user_id && a.deleted_at().is_none())
            .map(|a| a.id())
            .collect();
        for id in ids {
            let agent = state.agents[&id].clone();
            state.agents.insert(
                id,
                Agent::restore(
                    agent.id(),
                    agent.user_id(),
                    agent.name().to_string(),
                    agent.policy_ids().to_vec(),
                    agent.created_at(),
                    now,
                    Some(now),
                ),
            );
        }
        Ok(())
    }

    async fn find_by_id_and_user(
        &self,
        _session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Agent>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .agents
            .get(&id)
            .filter(|a| a.user_id() == user_id && a.deleted_at().is_none())
            .map(|a| hydrate_agent(&state, a)))
    }

    async fn find_by_user(
        &self,
        _session: &mut dyn StoreSession,
        user_id: Uuid,
    ) -> Result<Vec<Agent>> {
        let state = self.state.lock().unwrap();
        let mut agents: Vec<Agent> = state
            .agents
            .values()
            .filter(|a| a.user_id() == user_id && a.deleted_at().is_none())
            .map(|a| hydrate_agent(&state, a))
            .collect();
        agents.sort_by_key(|a| a.created_at());
        Ok(agents)
    }

    async fn find_by_ids_and_user(
        &self,
        _session: &mut dyn StoreSession,
        ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<Agent>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .agents
            .values()
            .filter(|a| {
                ids.contains(&a.id()) && a.user_id() == user_id && a.deleted_at().is_none()
            })
            .map(|a| hydrate_agent(&state, a))
            .collect())
    }

    async fn find_by_user_and_name(
        &self,
        _session: &mut dyn StoreSession,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<Agent>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .agents
            .values()
            .find(|a| a.user_id() == user_id && a.name() == name && a.deleted_at().is_none())
            .map(|a| hydrate_agent(&state, a)))
    }
}

#[async_trait]
impl PolicyRepository for MemStore {
    async fn create(&self, _session: &mut dyn StoreSession, policy: &Policy) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.policies.insert(policy.id(), policy.clone());
        Ok(())
    }

    async fn update(&self, _session: &mut dyn StoreSession, policy: &Policy) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.policies.get_mut(&policy.id()) {
            if existing.deleted_at().is_none() {
                *existing = policy.clone();
            }
        }
        Ok(())
    }

    async fn soft_delete(
        &self,
        _session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(policy) = state.policies.get(&id).cloned() {
            if policy.user_id() == user_id && policy.deleted_at().is_none() {
                let now = Utc::now();
                state.policies.insert(
                    id,
                    Policy::restore(
                        policy.id(),
                        policy.user_id(),
                        policy.name().to_string(),
                        policy.service(),
                        policy.path().to_string(),
                        policy.methods().to_vec(),
                        policy.agent_ids().to_vec(),
                        policy.created_at(),
                        now,
                        Some(now),
                    ),
                );
            }
        }
        Ok(())
    }

    async fn find_by_id_and_user(
        &self,
        _session: &mut dyn StoreSession,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Policy>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .policies
            .get(&id)
            .filter(|p| p.user_id() == user_id && p.deleted_at().is_none())
            .map(|p| hydrate_policy(&state, p)))
    }

    async fn find_by_user(
        &self,
        _session: &mut dyn StoreSession,
        user_id: Uuid,
    ) -> Result<Vec<Policy>> {
        let state = self.state.lock().unwrap();
        let mut policies: Vec<Policy> = state
            .policies
            .values()
            .filter(|p| p.user_id() == user_id && p.deleted_at().is_none())
            .map(|p| hydrate_policy(&state, p))
            .collect();
        policies.sort_by_key(|p| p.created_at());
        Ok(policies)
    }

    async fn find_by_ids_and_user(
        &self,
        _session: &mut dyn StoreSession,
        ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<Policy>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .policies
            .values()
            .filter(|p| {
                ids.contains(&p.id()) && p.user_id() == user_id && p.deleted_at().is_none()
            })
            .map(|p| hydrate_policy(&state, p))
            .collect())
    }

    async fn find_by_user_and_name(
        &self,
        _session: &mut dyn StoreSession,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<Policy>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .policies
            .values()
            .find(|p| p.user_id() == user_id && p.name() == name && p.deleted_at().is_none())
            .map(|p| hydrate_policy(&state, p)))
    }
}

#[async_trait]
impl PermissionRepository for MemStore {
    async fn create(
        &self,
        _session: &mut dyn StoreSession,
        permission: &Permission,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.permissions.push(permission.clone());
        Ok(())
    }

    async fn delete_by_agent(
        &self,
        _session: &mut dyn StoreSession,
        agent_id: Uuid,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.permissions.retain(|p| p.agent_id() != agent_id);
        Ok(())
    }

    async fn delete_by_policy(
        &self,
        _session: &mut dyn StoreSession,
        policy_id: Uuid,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.permissions.retain(|p| p.policy_id() != policy_id);
        Ok(())
    }
}

#[async_trait]
impl UserTokenRepository for MemStore {
    async fn create(&self, _session: &mut dyn StoreSession, token: &UserToken) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.user_tokens.push(token.clone());
        Ok(())
    }

    async fn delete_by_user(&self, _session: &mut dyn StoreSession, user_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.user_tokens.retain(|t| t.user_id() != user_id);
        Ok(())
    }

    async fn find_by_token_and_not_expired(
        &self,
        _session: &mut dyn StoreSession,
        token: &str,
    ) -> Result<Option<UserToken>> {
        let state = self.state.lock().unwrap();
        let now = Utc::now();
        Ok(state
            .user_tokens
            .iter()
            .find(|t| t.token() == token && !t.is_expired(now))
            .cloned())
    }
}

#[async_trait]
impl AgentTokenRepository for MemStore {
    async fn create(&self, _session: &mut dyn StoreSession, token: &AgentToken) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.agent_tokens.push(token.clone());
        Ok(())
    }

    async fn delete_by_agent(
        &self,
        _session: &mut dyn StoreSession,
        agent_id: Uuid,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.agent_tokens.retain(|t| t.agent_id() != agent_id);
        Ok(())
    }

    async fn find_by_agent(
        &self,
        _session: &mut dyn StoreSession,
        agent_id: Uuid,
    ) -> Result<Option<AgentToken>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .agent_tokens
            .iter()
            .find(|t| t.agent_id() == agent_id)
            .cloned())
    }
}

struct Harness {
    state: Arc<Mutex<StoreState>>,
    users: UserUsecase,
    agents: AgentUsecase,
    policies: PolicyUsecase,
}

fn harness() -> Harness {
    let state = Arc::new(Mutex::new(StoreState::default()));
    let store = Arc::new(MemStore {
        state: state.clone(),
    });
    let tx = Arc::new(MemTransactionManager {
        state: state.clone(),
    });

    let users = UserUsecase::new(tx.clone(), store.clone(), store.clone(), store.clone());
    let agents = AgentUsecase::new(
        tx.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    );
    let policies = PolicyUsecase::new(tx, store.clone(), store.clone(), store);

    Harness {
        state,
        users,
        agents,
        policies,
    }
}

fn string_vec(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn test_sign_up_and_sign_in() {
    let h = harness();

    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    assert_eq!(user.name(), "alice");
    assert_eq!(user.created_at(), user.updated_at());

    let token = h.users.sign_in("alice", "password1").await.unwrap();
    assert_eq!(token.token().len(), 32);
    assert_eq!(token.user_id(), user.id());

    let verified = h.users.verify_token(token.token()).await.unwrap();
    assert_eq!(verified.id(), user.id());
}

#[tokio::test]
async fn test_sign_in_rejects_bad_credentials() {
    let h = harness();
    h.users.sign_up("alice", "password1", "password1").await.unwrap();

    let err = h.users.sign_in("alice", "password2").await.unwrap_err();
    assert!(matches!(err, AppError::AuthenticationFailed));

    let err = h.users.sign_in("nobody", "password1").await.unwrap_err();
    assert!(matches!(err, AppError::AuthenticationFailed));
}

#[tokio::test]
async fn test_sign_in_replaces_existing_token() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();

    let first = h.users.sign_in("alice", "password1").await.unwrap();
    let second = h.users.sign_in("alice", "password1").await.unwrap();
    assert_ne!(first.token(), second.token());

    let live: usize = h
        .state
        .lock()
        .unwrap()
        .user_tokens
        .iter()
        .filter(|t| t.user_id() == user.id())
        .count();
    assert_eq!(live, 1);

    let err = h.users.verify_token(first.token()).await.unwrap_err();
    assert!(matches!(err, AppError::AuthenticationFailed));
    assert!(h.users.verify_token(second.token()).await.is_ok());
}

#[tokio::test]
async fn test_sign_up_duplicate_name_conflicts() {
    let h = harness();
    h.users.sign_up("alice", "password1", "password1").await.unwrap();

    let err = h
        .users
        .sign_up("alice", "password2", "password2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_expired_token_reads_as_absent() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();

    let now = Utc::now();
    let expired = UserToken::restore(
        Uuid::new_v4(),
        user.id(),
        "expiredexpiredexpiredexpiredexpi".to_string(),
        now - Duration::seconds(1),
        now - Duration::days(31),
    );
    h.state.lock().unwrap().user_tokens.push(expired.clone());

    let err = h.users.verify_token(expired.token()).await.unwrap_err();
    assert!(matches!(err, AppError::AuthenticationFailed));
}

#[tokio::test]
async fn test_sign_out_deletes_token() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let token = h.users.sign_in("alice", "password1").await.unwrap();

    h.users.sign_out(user.id()).await.unwrap();

    let err = h.users.verify_token(token.token()).await.unwrap_err();
    assert!(matches!(err, AppError::AuthenticationFailed));
    assert!(h.state.lock().unwrap().user_tokens.is_empty());
}

#[tokio::test]
async fn test_update_password() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();

    h.users
        .update_password(user.id(), "password2", "password2")
        .await
        .unwrap();

    assert!(h.users.sign_in("alice", "password2").await.is_ok());
    let err = h.users.sign_in("alice", "password1").await.unwrap_err();
    assert!(matches!(err, AppError::AuthenticationFailed));
}

#[tokio::test]
async fn test_agent_crud() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();

    let agent = h.agents.create(user.id(), "svc_a").await.unwrap();
    assert_eq!(agent.name(), "svc_a");
    assert_eq!(agent.created_at(), agent.updated_at());

    let err = h.agents.create(user.id(), "svc_a").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let renamed = h.agents.rename(agent.id(), user.id(), "svc_b").await.unwrap();
    assert_eq!(renamed.name(), "svc_b");

    let listed = h.agents.list(user.id()).await.unwrap();
    assert_eq!(listed.len(), 1);

    h.agents.delete(agent.id(), user.id()).await.unwrap();
    let err = h.agents.get(agent.id(), user.id()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("agent")));
}

#[tokio::test]
async fn test_owner_scoping_hides_foreign_entities() {
    let h = harness();
    let alice = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let bob = h.users.sign_up("bob", "password1", "password1").await.unwrap();

    let agent = h.agents.create(alice.id(), "svc_a").await.unwrap();

    // Bob sees Alice's agent as nonexistent, not as forbidden.
    let err = h.agents.get(agent.id(), bob.id()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("agent")));
}

#[tokio::test]
async fn test_policy_reconciliation_end_to_end() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let agent = h.agents.create(user.id(), "svc_a").await.unwrap();

    let policy = h
        .policies
        .create(
            user.id(),
            "read_storage",
            "STORAGE",
            "/files",
            &string_vec(&["GET"]),
        )
        .await
        .unwrap();
    assert_eq!(policy.path(), "/files");
    assert_eq!(policy.methods().len(), 1);

    let agent = h
        .agents
        .update_policies(agent.id(), user.id(), &[policy.id()])
        .await
        .unwrap();
    assert_eq!(agent.policy_ids(), &[policy.id()]);

    {
        let state = h.state.lock().unwrap();
        assert_eq!(state.permissions.len(), 1);
        let permission = &state.permissions[0];
        assert_eq!(permission.agent_id(), agent.id());
        assert_eq!(permission.policy_id(), policy.id());
        assert_eq!(permission.effect(), Effect::Allow);
    }

    let resolved = h.agents.get_policies(agent.id(), user.id()).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id(), policy.id());

    // Replacing with the empty set removes the association.
    let agent = h
        .agents
        .update_policies(agent.id(), user.id(), &[])
        .await
        .unwrap();
    assert!(agent.policy_ids().is_empty());
    assert!(h.state.lock().unwrap().permissions.is_empty());
}

#[tokio::test]
async fn test_policy_reconciliation_is_idempotent() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let agent = h.agents.create(user.id(), "svc_a").await.unwrap();
    let policy = h
        .policies
        .create(user.id(), "pol", "STORAGE", "/f", &string_vec(&["GET"]))
        .await
        .unwrap();

    // Duplicate ids in the input collapse, and re-applying the same target
    // set leaves exactly one permission row per id.
    h.agents
        .update_policies(agent.id(), user.id(), &[policy.id(), policy.id()])
        .await
        .unwrap();
    h.agents
        .update_policies(agent.id(), user.id(), &[policy.id()])
        .await
        .unwrap();

    assert_eq!(h.state.lock().unwrap().permissions.len(), 1);
}

#[tokio::test]
async fn test_update_policies_with_unknown_id_changes_nothing() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let agent = h.agents.create(user.id(), "svc_a").await.unwrap();
    let policy = h
        .policies
        .create(user.id(), "pol", "STORAGE", "/f", &string_vec(&["GET"]))
        .await
        .unwrap();

    h.agents
        .update_policies(agent.id(), user.id(), &[policy.id()])
        .await
        .unwrap();

    let err = h
        .agents
        .update_policies(agent.id(), user.id(), &[policy.id(), Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("policy")));

    // The previous association survives intact.
    let agent = h.agents.get(agent.id(), user.id()).await.unwrap();
    assert_eq!(agent.policy_ids(), &[policy.id()]);
    assert_eq!(h.state.lock().unwrap().permissions.len(), 1);
}

#[tokio::test]
async fn test_update_policies_rejects_foreign_policy() {
    let h = harness();
    let alice = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let bob = h.users.sign_up("bob", "password1", "password1").await.unwrap();

    let agent = h.agents.create(alice.id(), "svc_a").await.unwrap();
    let foreign = h
        .policies
        .create(bob.id(), "pol", "STORAGE", "/f", &string_vec(&["GET"]))
        .await
        .unwrap();

    let err = h
        .agents
        .update_policies(agent.id(), alice.id(), &[foreign.id()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("policy")));
}

#[tokio::test]
async fn test_policy_update_agents_mirrors_reconciliation() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let agent = h.agents.create(user.id(), "svc_a").await.unwrap();
    let policy = h
        .policies
        .create(user.id(), "pol", "CONTENT", "/posts", &string_vec(&["GET", "POST"]))
        .await
        .unwrap();

    let policy = h
        .policies
        .update_agents(policy.id(), user.id(), &[agent.id()])
        .await
        .unwrap();
    assert_eq!(policy.agent_ids(), &[agent.id()]);

    let agents = h.policies.get_agents(policy.id(), user.id()).await.unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].id(), agent.id());

    // The agent side observes the association written from the policy side.
    let agent = h.agents.get(agent.id(), user.id()).await.unwrap();
    assert_eq!(agent.policy_ids(), &[policy.id()]);

    let policy = h
        .policies
        .update_agents(policy.id(), user.id(), &[])
        .await
        .unwrap();
    assert!(policy.agent_ids().is_empty());
    assert!(h.state.lock().unwrap().permissions.is_empty());
}

#[tokio::test]
async fn test_policy_field_updates() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let policy = h
        .policies
        .create(user.id(), "pol", "STORAGE", "/files", &string_vec(&["GET"]))
        .await
        .unwrap();

    let updated = h
        .policies
        .update(
            policy.id(),
            user.id(),
            PolicyUpdate {
                path: Some("/files/docs/".to_string()),
                methods: Some(string_vec(&["PUT", "GET"])),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.path(), "/files/docs");
    assert_eq!(
        updated
            .methods()
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>(),
        vec!["GET", "PUT"]
    );

    // An invalid field value fails the whole update and persists nothing.
    let err = h
        .policies
        .update(
            policy.id(),
            user.id(),
            PolicyUpdate {
                service: Some("MAIL".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let reread = h.policies.get(policy.id(), user.id()).await.unwrap();
    assert_eq!(reread.service().as_str(), "STORAGE");
    assert_eq!(reread.path(), "/files/docs");
}

#[tokio::test]
async fn test_delete_user_cascades_to_agents() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let first = h.agents.create(user.id(), "svc_a").await.unwrap();
    h.agents.create(user.id(), "svc_b").await.unwrap();

    h.users.delete(user.id()).await.unwrap();

    assert!(h.agents.list(user.id()).await.unwrap().is_empty());
    let err = h.agents.get(first.id(), user.id()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("agent")));
}

#[tokio::test]
async fn test_deleted_policy_drops_out_of_agent_view() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let agent = h.agents.create(user.id(), "svc_a").await.unwrap();
    let policy = h
        .policies
        .create(user.id(), "pol", "STORAGE", "/f", &string_vec(&["GET"]))
        .await
        .unwrap();

    h.agents
        .update_policies(agent.id(), user.id(), &[policy.id()])
        .await
        .unwrap();
    h.policies.delete(policy.id(), user.id()).await.unwrap();

    // The permission row survives for history, but resolution filters the
    // soft-deleted policy out.
    assert_eq!(h.state.lock().unwrap().permissions.len(), 1);
    assert!(h
        .agents
        .get_policies(agent.id(), user.id())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_agent_token_lifecycle() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let agent = h.agents.create(user.id(), "svc_a").await.unwrap();

    let err = h.agents.get_token(agent.id(), user.id()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("agent token")));

    let first = h.agents.issue_token(agent.id(), user.id()).await.unwrap();
    assert_eq!(first.token().len(), 32);

    // Issuing again replaces, never appends.
    let second = h.agents.issue_token(agent.id(), user.id()).await.unwrap();
    assert_ne!(first.token(), second.token());
    assert_eq!(h.state.lock().unwrap().agent_tokens.len(), 1);

    let fetched = h.agents.get_token(agent.id(), user.id()).await.unwrap();
    assert_eq!(fetched.token(), second.token());

    h.agents.delete_token(agent.id(), user.id()).await.unwrap();
    let err = h.agents.get_token(agent.id(), user.id()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("agent token")));
}

#[tokio::test]
async fn test_user_and_agent_tokens_are_distinct() {
    let h = harness();
    let user = h.users.sign_up("alice", "password1", "password1").await.unwrap();
    let agent = h.agents.create(user.id(), "svc_a").await.unwrap();

    let user_token = h.users.sign_in("alice", "password1").await.unwrap();
    let agent_token = h.agents.issue_token(agent.id(), user.id()).await.unwrap();

    assert_ne!(user_token.token(), agent_token.token());
}

#[tokio::test]
async fn test_dropped_session_rolls_back() {
    let h = harness();
    let store = MemStore {
        state: h.state.clone(),
    };
    let tx = MemTransactionManager {
        state: h.state.clone(),
    };

    let user = User::new("alice", "password1", "password1").unwrap();
    {
        let mut session = tx.begin().await.unwrap();
        UserRepository::create(&store, session.as_mut(), &user)
            .await
            .unwrap();
        // Dropped without commit.
    }
    assert!(h.state.lock().unwrap().users.is_empty());

    let mut session = tx.begin().await.unwrap();
    UserRepository::create(&store, session.as_mut(), &user)
        .await
        .unwrap();
    tx.commit(session).await.unwrap();
    assert_eq!(h.state.lock().unwrap().users.len(), 1);
}
