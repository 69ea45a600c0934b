// User account entity

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::password;
use crate::domain::validation::validate_name;
use crate::errors::Result;

/// An interactive user account.
///
/// The password is held only as a bcrypt hash. Timestamps are stamped once
/// every field has validated, so `created_at == updated_at` on a fresh
/// entity and a partially-invalid user is never observable.
#[derive(Debug, Clone)]
pub struct User {
    id: Uuid,
    name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a user from a display name and a confirmed password.
    pub fn new(name: &str, password: &str, confirm: &str) -> Result<Self> {
        validate_name("name", name)?;
        let password_hash = password::hash(password, confirm)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Rebuild a user from previously-validated stored fields.
    pub fn restore(
        id: Uuid,
        name: String,
        password_hash: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            name,
            password_hash,
            created_at,
            updated_at,
            deleted_at,
        }
    }

    /// Re-hash the password from a new confirmed plaintext.
    pub fn set_password(&mut self, password: &str, confirm: &str) -> Result<()> {
        let password_hash = password::hash(password, confirm)?;
        self.password_hash = password_hash;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Check a plaintext password against the stored hash.
    pub fn verify_password(&self, password: &str) -> Result<()> {
        password::verify(password, &self.password_hash)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
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
