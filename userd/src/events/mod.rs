//! Fire-and-forget publication of account events
//!
//! Publishing never reports failure to the caller. Streams that talk to a
//! remote system log delivery problems and drop the event.

mod broadcaster;
mod collector;
mod log;
mod redis;

pub use broadcaster::Broadcaster;
pub use collector::{CollectedEvent, EventCollector};
pub use self::log::LogEventStream;
pub use self::redis::RedisEventStream;

pub const USER_CREATED: &str = "user.created";
pub const USER_AUTHENTICATED: &str = "user.authenticated";
pub const USER_LOGIN_CREDENTIALS_CHANGED: &str = "user.login_credentials_changed";
pub const USER_PASSWORD_CHANGED: &str = "user.password_changed";
pub const USER_PROFILE_NAME_CHANGED: &str = "user.profile_name_changed";
pub const USER_EMAIL_CHANGED: &str = "user.email_changed";
pub const USER_EMAIL_VERIFIED: &str = "user.email_verified";
pub const USER_RESET_TOKEN_CREATED: &str = "user.reset_login_credentials_token_created";
pub const USER_LOGIN_CREDENTIALS_RESET: &str = "user.login_credentials_reset";

pub trait EventStream: Send + Sync + 'static {
    /// Hand `payload` to the stream under `tag`. Must not block on I/O.
    fn publish(&self, tag: &str, payload: &[u8]);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEventStream;

impl EventStream for NoEventStream {
    fn publish(&self, _tag: &str, _payload: &[u8]) {}
}

fn with_prefix(prefix: &str, tag: &str) -> String {
    if prefix.is_empty() {
        tag.to_string()
    } else {
        format!("{prefix}.{tag}")
    }
}
