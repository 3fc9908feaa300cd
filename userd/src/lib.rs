//! userd - user accounts on a pluggable key-value store
//!
//! Accounts are kept as serialized blobs keyed by user id, with secondary
//! indexes on login name, email and reset token that are unique across
//! users. The store runs on memory, Redis or etcd, and the service adds
//! authentication, email verification and credential reset on top.

mod clock;
mod config;
mod events;
mod hasher;
mod idfactory;
mod service;
mod storage;
mod userdb;

pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, EventStreamConfig, HasherConfig, IdFactoryConfig, UserdConfig};

pub use events::{
    Broadcaster, CollectedEvent, EventCollector, EventStream, LogEventStream, NoEventStream,
    RedisEventStream, USER_AUTHENTICATED, USER_CREATED, USER_EMAIL_CHANGED, USER_EMAIL_VERIFIED,
    USER_LOGIN_CREDENTIALS_CHANGED, USER_LOGIN_CREDENTIALS_RESET, USER_PASSWORD_CHANGED,
    USER_PROFILE_NAME_CHANGED, USER_RESET_TOKEN_CREATED,
};

pub use hasher::{Argon2Hasher, HasherError, PasswordHasher};
pub use idfactory::{IdFactory, IdFactoryError, SequenceIdFactory, UuidIdFactory};

pub use service::{DEFAULT_RESET_TOKEN_EXPIRY, Dependencies, ServiceConfig, ServiceError, UserService};

pub use storage::{
    Backend, BackendIndex, EtcdConfig, EtcdDriver, EtcdIndex, INDEX_EMAILS, INDEX_LOGIN_NAME,
    INDEX_RESET_PASSWORD_TOKEN, InMemoryDriver, InMemoryIndex, KeyValueIndex, RedisDriver,
    RedisIndex, StorageConfig, StorageDriver, StorageError,
};

pub use userdb::{User, UserError, UserSearchField, UserStore};
