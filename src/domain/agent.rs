// Delegated agent identity entity

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::validation::validate_name;
use crate::errors::Result;

/// A delegated, non-interactive identity belonging to a user, authorized
/// through its associated policies.
#[derive(Debug, Clone)]
pub struct Agent {
    id: Uuid,
    user_id: Uuid,
    name: String,
    policy_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Agent {
    /// Create an agent under the given user.
    pub fn new(user_id: Uuid, name: &str) -> Result<Self> {
        validate_name("name", name)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            policy_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Rebuild an agent from previously-validated stored fields.
    pub fn restore(
        id: Uuid,
        user_id: Uuid,
        name: String,
        policy_ids: Vec<Uuid>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            name,
            policy_ids,
            created_at,
            updated_at,
            deleted_at,
        }
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        validate_name("name", name)?;
        self.name = name.to_string();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replace the associated policy set with the authoritative target set.
    ///
    /// Ids are stored deduplicated in a canonical sorted order; the caller
    /// owns reconciling the permission rows against this set.
    pub fn set_policies(&mut self, policy_ids: &[Uuid]) {
        let mut ids = policy_ids.to_vec();
        ids.sort();
        ids.dedup();
        self.policy_ids = ids;
        self.updated_at = Utc::now();
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy_ids(&self) -> &[Uuid] {
        &self.policy_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}
