// Bearer token entities

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::token;
use crate::errors::Result;

/// Lifetime of an interactive user token.
pub const USER_TOKEN_TTL_DAYS: i64 = 30;

/// A short-lived bearer token for an interactive user.
///
/// One active token per user: sign-in replaces any prior token, sign-out
/// deletes it. Validity is `now < expires_at` against the storage clock;
/// an expired token is indistinguishable from an absent one.
#[derive(Debug, Clone)]
pub struct UserToken {
    id: Uuid,
    user_id: Uuid,
    token: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl UserToken {
    /// Issue a fresh token expiring 30 days from now.
    pub fn issue(user_id: Uuid) -> Result<Self> {
        let token = token::generate()?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            expires_at: now + Duration::days(USER_TOKEN_TTL_DAYS),
            created_at: now,
        })
    }

    /// Rebuild a token from stored fields.
    pub fn restore(
        id: Uuid,
        user_id: Uuid,
        token: String,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            token,
            expires_at,
            created_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A long-lived bearer token for an agent.
///
/// One per agent; created, replaced, and deleted explicitly, never expired
/// on a timer.
#[derive(Debug, Clone)]
pub struct AgentToken {
    id: Uuid,
    agent_id: Uuid,
    token: String,
    generated_at: DateTime<Utc>,
}

impl AgentToken {
    pub fn issue(agent_id: Uuid) -> Result<Self> {
        let token = token::generate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            agent_id,
            token,
            generated_at: Utc::now(),
        })
    }

    /// Rebuild a token from stored fields.
    pub fn restore(id: Uuid, agent_id: Uuid, token: String, generated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            agent_id,
            token,
            generated_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}
