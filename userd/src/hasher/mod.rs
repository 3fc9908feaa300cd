//! Password hashing capability
//!
//! The service never compares hashes itself. It hands passwords and stored
//! hashes to a [`PasswordHasher`], which also decides when a stored hash was
//! produced with outdated parameters and should be replaced.

mod argon2;
mod errors;

pub use self::argon2::Argon2Hasher;
pub use errors::HasherError;

pub trait PasswordHasher: Send + Sync + 'static {
    /// Hash `password` with the current parameters.
    fn hash(&self, password: &str) -> Result<String, HasherError>;

    /// Whether `password` matches `hash`. Malformed hashes never match.
    fn verify(&self, password: &str, hash: &str) -> bool;

    /// Whether `hash` should be replaced by a fresh [`PasswordHasher::hash`].
    fn needs_rehash(&self, hash: &str) -> bool;
}
