use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of random bytes behind a token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Encoded length of a token (unpadded URL-safe base64 of 32 bytes).
const TOKEN_LEN: usize = 43;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("session token generation failed: {0}")]
pub struct TokenGenerationError(String);

/// Opaque, unguessable session token.
///
/// - 256 bits from the OS RNG
/// - URL-safe base64, so it can travel in a cookie unescaped
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh token. Fails only if the OS RNG is unavailable.
    pub fn generate() -> Result<Self, TokenGenerationError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TokenGenerationError(e.to_string()))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Accept a client-supplied value only if it has the shape of a token we
    /// could have issued. Anything else is treated as "no session".
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != TOKEN_LEN {
            return None;
        }
        let decoded = URL_SAFE_NO_PAD.decode(value).ok()?;
        (decoded.len() == TOKEN_BYTES).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Enough to correlate log lines, not enough to hijack the session.
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "SessionToken({prefix}…)")
    }
}
