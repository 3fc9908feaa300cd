use chrono::TimeDelta;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::events::{EventStream, NoEventStream};
use crate::hasher::{Argon2Hasher, PasswordHasher};
use crate::idfactory::{IdFactory, UuidIdFactory};

/// Default lifetime of a reset password token
pub const DEFAULT_RESET_TOKEN_EXPIRY: TimeDelta = TimeDelta::hours(24);

/// Business rules of the user service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Refuse authentication until the email address is verified
    pub auth_email_must_be_verified: bool,
    /// How long a reset password token stays valid after being issued
    pub reset_token_expiry: TimeDelta,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            auth_email_must_be_verified: true,
            reset_token_expiry: DEFAULT_RESET_TOKEN_EXPIRY,
        }
    }
}

/// Collaborators the service delegates to
#[derive(Clone)]
pub struct Dependencies {
    pub id_factory: Arc<dyn IdFactory>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub events: Arc<dyn EventStream>,
    pub clock: Arc<dyn Clock>,
}

impl Default for Dependencies {
    fn default() -> Self {
        Self {
            id_factory: Arc::new(UuidIdFactory),
            hasher: Arc::new(Argon2Hasher::default()),
            events: Arc::new(NoEventStream),
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
