//! Password hashing and verification.
//!
//! bcrypt keeps verification attacker-expensive; the work factor is
//! configurable so tests can use a cheap cost.

/// Default bcrypt work factor for production use.
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Errors that can occur while hashing a password.
#[derive(Debug)]
pub struct HashError(String);

impl std::fmt::Display for HashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to hash password: {}", self.0)
    }
}

impl std::error::Error for HashError {}

/// Hash a plaintext password with the given bcrypt cost.
pub fn hash(plain: &str, cost: u32) -> Result<String, HashError> {
    bcrypt::hash(plain, cost).map_err(|e| HashError(e.to_string()))
}

/// Verify a plaintext password against a stored hash.
///
/// Returns false for any mismatch, including a stored hash that fails
/// to parse. Callers cannot distinguish a wrong password from a
/// malformed hash.
pub fn verify(stored_hash: &str, plain: &str) -> bool {
    bcrypt::verify(plain, stored_hash).unwrap_or(false)
}
