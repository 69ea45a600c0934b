// Password hashing with bcrypt

use crate::errors::{AppError, Result, ValidationError, ValidationKind};

/// Accepted password length in bytes. The upper bound is the bcrypt input
/// ceiling.
pub const PASSWORD_MIN_BYTES: usize = 8;
pub const PASSWORD_MAX_BYTES: usize = 72;

/// Length of every bcrypt hash string.
pub const HASH_LENGTH: usize = 60;

/// Hash a password, requiring a matching confirmation.
///
/// The cost is bcrypt's default, tuned for interactive login latency and
/// deliberately not configurable by callers.
pub fn hash(password: &str, confirm: &str) -> Result<String> {
    if password != confirm {
        return Err(ValidationError::new("password", ValidationKind::Mismatch).into());
    }
    if password.len() < PASSWORD_MIN_BYTES {
        return Err(ValidationError::new("password", ValidationKind::TooShort).into());
    }
    if password.len() > PASSWORD_MAX_BYTES {
        return Err(ValidationError::new("password", ValidationKind::TooLong).into());
    }

    let hashed = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    Ok(hashed)
}

/// Verify a password against a stored hash.
///
/// Every failure collapses to `AuthenticationFailed`; callers never learn
/// whether the hash was malformed or the password wrong.
pub fn verify(password: &str, hash: &str) -> Result<()> {
    match bcrypt::verify(password, hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::AuthenticationFailed),
        Err(_) => Err(AppError::AuthenticationFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationKind;

    fn validation_kind(err: AppError) -> ValidationKind {
        match err {
            AppError::Validation(e) => e.kind,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_hash_length_is_fixed() {
        let hash = hash("password1", "password1").unwrap();
        assert_eq!(hash.len(), HASH_LENGTH);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_hash_salted() {
        // Same password hashes differently each time
        let first = hash("password1", "password1").unwrap();
        let second = hash("password1", "password1").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_short_password() {
        let err = hash("abc1234", "abc1234").unwrap_err();
        assert_eq!(validation_kind(err), ValidationKind::TooShort);
    }

    #[test]
    fn test_minimum_length_accepted() {
        assert!(hash("abc12345", "abc12345").is_ok());
    }

    #[test]
    fn test_over_long_password() {
        let long = "a".repeat(73);
        let err = hash(&long, &long).unwrap_err();
        assert_eq!(validation_kind(err), ValidationKind::TooLong);
    }

    #[test]
    fn test_confirmation_mismatch() {
        let err = hash("password1", "password2").unwrap_err();
        assert_eq!(validation_kind(err), ValidationKind::Mismatch);
    }

    #[test]
    fn test_verify_roundtrip() {
        let hashed = hash("password1", "password1").unwrap();
        assert!(verify("password1", &hashed).is_ok());
    }

    #[test]
    fn test_verify_wrong_password() {
        let hashed = hash("password1", "password1").unwrap();
        let err = verify("password2", &hashed).unwrap_err();
        assert!(matches!(err, AppError::AuthenticationFailed));
    }

    #[test]
    fn test_verify_garbage_hash() {
        let err = verify("password1", "not a hash").unwrap_err();
        assert!(matches!(err, AppError::AuthenticationFailed));
    }
}
