// Opaque bearer token generation

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

use crate::errors::{AppError, Result};

/// Raw entropy per token. 24 bytes encode to exactly 32 base64 characters
/// with no padding.
pub const TOKEN_BYTES: usize = 24;

/// Length of every issued token.
pub const TOKEN_LENGTH: usize = 32;

/// Generate an opaque bearer token: 24 cryptographically secure random
/// bytes, URL-safe base64 without padding.
///
/// Uniqueness is probabilistic (192 bits of entropy); the storage layer's
/// uniqueness constraint is the backstop. The length check is a contract
/// assertion, not an expected runtime path.
pub fn generate() -> Result<String> {
    let mut raw = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut raw);

    let token = URL_SAFE_NO_PAD.encode(raw);
    if token.len() > TOKEN_LENGTH {
        return Err(AppError::TokenTooLong);
    }
    Ok(token)
}
