//! Generation of user ids and reset tokens

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ring::rand::SecureRandom;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Number of random bytes in a reset token
const RESET_TOKEN_BYTES: usize = 32;

#[derive(Debug, Error, Clone)]
pub enum IdFactoryError {
    #[error("Crypto error: {0}")]
    Crypto(String),
}

/// Source of fresh identifiers. Both methods return non-empty values that
/// are unique in practice.
pub trait IdFactory: Send + Sync + 'static {
    fn new_user_id(&self) -> Result<String, IdFactoryError>;

    fn new_reset_password_token(&self) -> Result<String, IdFactoryError>;
}

/// UUID v4 user ids and random base64url reset tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdFactory;

impl IdFactory for UuidIdFactory {
    fn new_user_id(&self) -> Result<String, IdFactoryError> {
        Ok(uuid::Uuid::new_v4().to_string())
    }

    fn new_reset_password_token(&self) -> Result<String, IdFactoryError> {
        gen_random_string(RESET_TOKEN_BYTES)
    }
}

/// Predictable `<prefix><n>` ids, for tests and local setups.
#[derive(Debug)]
pub struct SequenceIdFactory {
    prefix: String,
    sequence: AtomicU64,
}

impl SequenceIdFactory {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(0),
        }
    }

    fn next(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{n}", self.prefix)
    }
}

impl IdFactory for SequenceIdFactory {
    fn new_user_id(&self) -> Result<String, IdFactoryError> {
        Ok(self.next())
    }

    fn new_reset_password_token(&self) -> Result<String, IdFactoryError> {
        Ok(self.next())
    }
}

pub(crate) fn gen_random_string(len: usize) -> Result<String, IdFactoryError> {
    let rng = ring::rand::SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| IdFactoryError::Crypto("Failed to generate random string".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_user_ids_are_unique() {
        let factory = UuidIdFactory;

        let ids: HashSet<_> = (0..100).map(|_| factory.new_user_id().unwrap()).collect();

        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|id| uuid::Uuid::parse_str(id).is_ok()));
    }

    #[test]
    fn test_reset_tokens_are_url_safe() {
        // Given a uuid factory
        let factory = UuidIdFactory;

        // When generating a token
        let token = factory.new_reset_password_token().unwrap();

        // Then it encodes 32 bytes without padding
        assert_eq!(URL_SAFE_NO_PAD.decode(&token).unwrap().len(), RESET_TOKEN_BYTES);
        assert!(!token.contains('='));
        assert!(!token.contains('+') && !token.contains('/'));
    }

    #[test]
    fn test_sequence_factory_counts_up() {
        let factory = SequenceIdFactory::new("user-");

        assert_eq!(factory.new_user_id().unwrap(), "user-1");
        assert_eq!(factory.new_user_id().unwrap(), "user-2");
        // Tokens share the sequence
        assert_eq!(factory.new_reset_password_token().unwrap(), "user-3");
    }

    #[test]
    fn test_sequence_factory_without_prefix() {
        let factory = SequenceIdFactory::new("");

        assert_eq!(factory.new_user_id().unwrap(), "1");
    }

    #[test]
    fn test_sequence_factory_is_unique_across_threads() {
        let factory = std::sync::Arc::new(SequenceIdFactory::new("u"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let factory = std::sync::Arc::clone(&factory);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| factory.new_user_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.extend(handle.join().unwrap());
        }
        assert_eq!(ids.len(), 200);
    }
}
