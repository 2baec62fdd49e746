//! Password hash verification.

/// One-way password hash comparison.
///
/// - No IO
/// - No panics: a malformed stored hash is a failed verification, not an error
pub trait PasswordHasher: Send + Sync {
    fn verify(&self, plaintext: &str, stored_hash: &str) -> bool;
}

/// bcrypt-backed hasher.
///
/// `bcrypt::verify` compares digests with a constant-time primitive, so the
/// comparison itself does not leak how much of the secret matched.
#[derive(Debug, Clone, Copy, Default)]
pub struct BcryptHasher;

impl BcryptHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash a password for seed data and tests.
    pub fn hash(plaintext: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(plaintext, cost)
    }
}

impl PasswordHasher for BcryptHasher {
    fn verify(&self, plaintext: &str, stored_hash: &str) -> bool {
        match bcrypt::verify(plaintext, stored_hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::debug!(op = "password.verify", error = %e, "stored hash rejected");
                false
            }
        }
    }
}
