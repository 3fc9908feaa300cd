//! Startup configuration read from `USERD_*` environment variables

use chrono::TimeDelta;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::clock::SystemClock;
use crate::events::{
    Broadcaster, EventCollector, EventStream, LogEventStream, NoEventStream, RedisEventStream,
};
use crate::hasher::{Argon2Hasher, HasherError};
use crate::idfactory::{IdFactory, SequenceIdFactory, UuidIdFactory};
use crate::service::{DEFAULT_RESET_TOKEN_EXPIRY, Dependencies, ServiceConfig, UserService};
use crate::storage::{Backend, EtcdConfig, StorageConfig, StorageError};
use crate::userdb::UserStore;

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
const DEFAULT_ETCD_ENDPOINT: &str = "http://localhost:2379";
const DEFAULT_ETCD_PREFIX: &str = "userd";
const DEFAULT_SEQ_PREFIX: &str = "user-";
const DEFAULT_COLLECTOR_MAX_ITEMS: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported value {value:?} for {var}")]
    UnsupportedValue { var: &'static str, value: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Hasher error: {0}")]
    Hasher(#[from] HasherError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdFactoryConfig {
    Uuid,
    Sequence { prefix: String },
}

/// Argon2 cost parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasherConfig {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            m_cost: argon2::Params::DEFAULT_M_COST,
            t_cost: argon2::Params::DEFAULT_T_COST,
            p_cost: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStreamConfig {
    Log,
    Redis { use_publish: bool },
    Collector { max_items: usize },
}

/// Everything needed to assemble a [`UserService`].
#[derive(Debug, Clone)]
pub struct UserdConfig {
    pub storage: StorageConfig,
    pub id_factory: IdFactoryConfig,
    pub hasher: HasherConfig,
    /// Streams events go to. Empty means events are discarded.
    pub event_streams: Vec<EventStreamConfig>,
    pub event_prefix: String,
    /// Redis used by the redis event stream
    pub redis_url: String,
    pub service: ServiceConfig,
}

impl Default for UserdConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::Memory,
            id_factory: IdFactoryConfig::Uuid,
            hasher: HasherConfig::default(),
            event_streams: Vec::new(),
            event_prefix: String::new(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            service: ServiceConfig::default(),
        }
    }
}

impl UserdConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Read the configuration through `var`, which returns the value of a
    /// variable or `None` when unset.
    ///
    /// Unknown choices are errors. Malformed numbers and flags fall back to
    /// their default with a warning.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let redis_url = var("USERD_REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

        let storage = match choice(&var, "USERD_STORAGE", "memory").as_str() {
            "memory" => StorageConfig::Memory,
            "redis" => StorageConfig::Redis {
                url: redis_url.clone(),
            },
            "etcd" => StorageConfig::Etcd(EtcdConfig {
                endpoint: var("USERD_ETCD_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_ETCD_ENDPOINT.to_string()),
                prefix: var("USERD_ETCD_PREFIX").unwrap_or_else(|| DEFAULT_ETCD_PREFIX.to_string()),
                ttl: match parse_or(&var, "USERD_ETCD_TTL_SECS", 0u64) {
                    0 => None,
                    secs => Some(Duration::from_secs(secs)),
                },
            }),
            other => return Err(unsupported("USERD_STORAGE", other)),
        };

        let id_factory = match choice(&var, "USERD_IDFACTORY", "uuid").as_str() {
            "uuid" => IdFactoryConfig::Uuid,
            "seq" => IdFactoryConfig::Sequence {
                prefix: var("USERD_IDFACTORY_SEQ_PREFIX")
                    .unwrap_or_else(|| DEFAULT_SEQ_PREFIX.to_string()),
            },
            other => return Err(unsupported("USERD_IDFACTORY", other)),
        };

        let defaults = HasherConfig::default();
        let hasher = HasherConfig {
            m_cost: parse_or(&var, "USERD_ARGON2_M_COST", defaults.m_cost),
            t_cost: parse_or(&var, "USERD_ARGON2_T_COST", defaults.t_cost),
            p_cost: parse_or(&var, "USERD_ARGON2_P_COST", defaults.p_cost),
        };

        let mut event_streams = Vec::new();
        for name in choice(&var, "USERD_EVENTSTREAM", "none").split(',') {
            match name.trim() {
                "" | "none" => {}
                "log" => event_streams.push(EventStreamConfig::Log),
                "redis" => event_streams.push(EventStreamConfig::Redis {
                    use_publish: parse_bool_or(&var, "USERD_EVENTSTREAM_REDIS_PUBSUB", false),
                }),
                "collector" => event_streams.push(EventStreamConfig::Collector {
                    max_items: parse_or(
                        &var,
                        "USERD_EVENTSTREAM_COLLECTOR_MAX_ITEMS",
                        DEFAULT_COLLECTOR_MAX_ITEMS,
                    ),
                }),
                other => return Err(unsupported("USERD_EVENTSTREAM", other)),
            }
        }

        let expiry_secs = parse_or(
            &var,
            "USERD_RESET_TOKEN_EXPIRY_SECS",
            DEFAULT_RESET_TOKEN_EXPIRY.num_seconds(),
        );
        let reset_token_expiry = match TimeDelta::try_seconds(expiry_secs) {
            Some(expiry) if expiry > TimeDelta::zero() => expiry,
            _ => {
                tracing::warn!(
                    value = expiry_secs,
                    "USERD_RESET_TOKEN_EXPIRY_SECS out of range, using default"
                );
                DEFAULT_RESET_TOKEN_EXPIRY
            }
        };

        let service = ServiceConfig {
            auth_email_must_be_verified: parse_bool_or(
                &var,
                "USERD_AUTH_EMAIL_MUST_BE_VERIFIED",
                true,
            ),
            reset_token_expiry,
        };

        Ok(Self {
            storage,
            id_factory,
            hasher,
            event_streams,
            event_prefix: var("USERD_EVENTSTREAM_PREFIX").unwrap_or_default(),
            redis_url,
            service,
        })
    }

    /// Construct the collaborators described by this configuration.
    pub async fn dependencies(&self) -> Result<Dependencies, ConfigError> {
        let id_factory: Arc<dyn IdFactory> = match &self.id_factory {
            IdFactoryConfig::Uuid => Arc::new(UuidIdFactory),
            IdFactoryConfig::Sequence { prefix } => Arc::new(SequenceIdFactory::new(prefix.clone())),
        };

        let hasher = Argon2Hasher::new(self.hasher.m_cost, self.hasher.t_cost, self.hasher.p_cost)?;

        let mut streams: Vec<Arc<dyn EventStream>> = Vec::with_capacity(self.event_streams.len());
        for stream in &self.event_streams {
            let stream: Arc<dyn EventStream> = match stream {
                EventStreamConfig::Log => Arc::new(LogEventStream::new(self.event_prefix.clone())),
                EventStreamConfig::Redis { use_publish } => Arc::new(
                    RedisEventStream::connect(
                        &self.redis_url,
                        self.event_prefix.clone(),
                        *use_publish,
                    )
                    .await?,
                ),
                EventStreamConfig::Collector { max_items } => {
                    Arc::new(EventCollector::new(*max_items))
                }
            };
            streams.push(stream);
        }
        let events: Arc<dyn EventStream> = match streams.len() {
            0 => Arc::new(NoEventStream),
            1 => streams.remove(0),
            _ => {
                let mut broadcaster = Broadcaster::new();
                for stream in streams {
                    broadcaster.add_stream(stream);
                }
                Arc::new(broadcaster)
            }
        };

        Ok(Dependencies {
            id_factory,
            hasher: Arc::new(hasher),
            events,
            clock: Arc::new(SystemClock),
        })
    }

    /// Connect the storage backend and assemble the service.
    pub async fn build(&self) -> Result<UserService<Backend>, ConfigError> {
        let deps = self.dependencies().await?;
        let backend = Backend::connect(&self.storage).await?;
        tracing::info!(
            storage = self.storage.kind(),
            event_streams = self.event_streams.len(),
            "User service ready"
        );
        Ok(UserService::new(
            UserStore::new(backend),
            deps,
            self.service.clone(),
        ))
    }
}

fn choice<F>(var: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = var(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(var = key, value = %raw, fallback = %default, "Invalid number, using default");
            default
        }
    }
}

fn parse_bool_or<F>(var: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => {
            tracing::warn!(var = key, value = %raw, fallback = default, "Invalid flag, using default");
            default
        }
    }
}

fn unsupported(var: &'static str, value: &str) -> ConfigError {
    ConfigError::UnsupportedValue {
        var,
        value: value.to_string(),
    }
}
