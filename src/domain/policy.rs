// Access policy entity

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::validation::{normalize_path, validate_name, Method, Service};
use crate::errors::Result;

/// A named rule describing an allowed service, path, and HTTP method set.
///
/// Constructors and setters validate through the shared primitives; the
/// stored path is normalized and the method set is kept in canonical
/// sorted, deduplicated form.
#[derive(Debug, Clone)]
pub struct Policy {
    id: Uuid,
    user_id: Uuid,
    name: String,
    service: Service,
    path: String,
    methods: Vec<Method>,
    agent_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Policy {
    /// Create a policy under the given user. Fields validate in a fixed
    /// order (name, service, path, methods); the first failure wins and
    /// timestamps are stamped only after every field has validated.
    pub fn new(
        user_id: Uuid,
        name: &str,
        service: &str,
        path: &str,
        methods: &[String],
    ) -> Result<Self> {
        validate_name("name", name)?;
        let service = Service::parse(service)?;
        let path = normalize_path(path)?;
        let methods = Method::parse_set(methods)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            service,
            path,
            methods,
            agent_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Rebuild a policy from previously-validated stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        user_id: Uuid,
        name: String,
        service: Service,
        path: String,
        methods: Vec<Method>,
        agent_ids: Vec<Uuid>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            name,
            service,
            path,
            methods,
            agent_ids,
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

    pub fn set_service(&mut self, service: &str) -> Result<()> {
        self.service = Service::parse(service)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_path(&mut self, path: &str) -> Result<()> {
        self.path = normalize_path(path)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_methods(&mut self, methods: &[String]) -> Result<()> {
        self.methods = Method::parse_set(methods)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replace the associated agent set with the authoritative target set.
    pub fn set_agents(&mut self, agent_ids: &[Uuid]) {
        let mut ids = agent_ids.to_vec();
        ids.sort();
        ids.dedup();
        self.agent_ids = ids;
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

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn agent_ids(&self) -> &[Uuid] {
        &self.agent_ids
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
