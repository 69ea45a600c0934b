// Agent-policy permission join entity

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::validation::Effect;
use crate::errors::Result;

/// The join record realizing one agent-policy association.
///
/// Permissions are never addressed individually by the use-case layer;
/// they exist to materialize the association and are fully owned by
/// whichever side's bulk update ran last.
#[derive(Debug, Clone)]
pub struct Permission {
    id: Uuid,
    agent_id: Uuid,
    policy_id: Uuid,
    effect: Effect,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(agent_id: Uuid, policy_id: Uuid, effect: &str) -> Result<Self> {
        let effect = Effect::parse(effect)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            agent_id,
            policy_id,
            effect,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a permission from previously-validated stored fields.
    pub fn restore(
        id: Uuid,
        agent_id: Uuid,
        policy_id: Uuid,
        effect: Effect,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            agent_id,
            policy_id,
            effect,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    pub fn policy_id(&self) -> Uuid {
        self.policy_id
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_permission() {
        let agent_id = Uuid::new_v4();
        let policy_id = Uuid::new_v4();
        let permission = Permission::new(agent_id, policy_id, "ALLOW").unwrap();

        assert_eq!(permission.agent_id(), agent_id);
        assert_eq!(permission.policy_id(), policy_id);
        assert_eq!(permission.effect(), Effect::Allow);
        assert_eq!(permission.created_at(), permission.updated_at());
    }

    #[test]
    fn test_new_permission_rejects_unknown_effect() {
        assert!(Permission::new(Uuid::new_v4(), Uuid::new_v4(), "BLOCK").is_err());
        assert!(Permission::new(Uuid::new_v4(), Uuid::new_v4(), "allow").is_err());
    }
}
