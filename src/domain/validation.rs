// Field validation primitives shared by the domain entities

use crate::errors::{ValidationError, ValidationKind};

/// Bounds shared by user, agent, and policy names.
pub const NAME_MIN_LENGTH: usize = 3;
pub const NAME_MAX_LENGTH: usize = 255;

/// Maximum accepted path length.
pub const PATH_MAX_LENGTH: usize = 255;

/// Validate a handle-style name: 3-255 characters from `[A-Za-z0-9_]`.
///
/// Length is checked before format, so an out-of-bounds name reports a
/// length error even when its characters are also invalid.
pub fn validate_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let length = value.chars().count();
    if length < NAME_MIN_LENGTH {
        return Err(ValidationError::new(field, ValidationKind::TooShort));
    }
    if length > NAME_MAX_LENGTH {
        return Err(ValidationError::new(field, ValidationKind::TooLong));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::new(field, ValidationKind::InvalidFormat));
    }
    Ok(())
}

/// Normalize a policy path.
///
/// Rejects empty, over-long, and non-absolute input, then strips trailing
/// slashes unless the path is exactly the root. Idempotent:
/// `normalize_path(normalize_path(p)) == normalize_path(p)`.
pub fn normalize_path(value: &str) -> Result<String, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new("path", ValidationKind::Required));
    }
    if value.chars().count() > PATH_MAX_LENGTH {
        return Err(ValidationError::new("path", ValidationKind::TooLong));
    }
    if !value.starts_with('/') {
        return Err(ValidationError::new("path", ValidationKind::InvalidFormat));
    }

    let trimmed = value.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok("/".to_string());
    }
    Ok(trimmed.to_string())
}

/// HTTP methods a policy may grant.
///
/// Variants are declared in the lexicographic order of their wire names;
/// the derived `Ord` is the canonical sort order for stored method sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    Delete,
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }

    /// Case-sensitive parse of a single method name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DELETE" => Some(Method::Delete),
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            _ => None,
        }
    }

    /// Validate a method list into its canonical form: non-empty, every
    /// element a known method, output sorted ascending and deduplicated.
    pub fn parse_set(values: &[String]) -> Result<Vec<Method>, ValidationError> {
        if values.is_empty() {
            return Err(ValidationError::new("methods", ValidationKind::Required));
        }

        let mut methods = Vec::with_capacity(values.len());
        for value in values {
            let method = Method::parse(value)
                .ok_or_else(|| ValidationError::new("methods", ValidationKind::InvalidFormat))?;
            methods.push(method);
        }
        methods.sort();
        methods.dedup();
        Ok(methods)
    }
}

/// Services a policy can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Storage,
    Content,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Storage => "STORAGE",
            Service::Content => "CONTENT",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "STORAGE" => Ok(Service::Storage),
            "CONTENT" => Ok(Service::Content),
            _ => Err(ValidationError::new("service", ValidationKind::InvalidFormat)),
        }
    }
}

/// Effect carried by a permission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "ALLOW",
            Effect::Deny => "DENY",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "ALLOW" => Ok(Effect::Allow),
            "DENY" => Ok(Effect::Deny),
            _ => Err(ValidationError::new("effect", ValidationKind::InvalidFormat)),
        }
    }
}
