use super::{EventStream, with_prefix};

/// Writes events to the `userd::events` tracing target.
#[derive(Debug, Clone, Default)]
pub struct LogEventStream {
    prefix: String,
}

impl LogEventStream {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl EventStream for LogEventStream {
    fn publish(&self, tag: &str, payload: &[u8]) {
        tracing::info!(
            target: "userd::events",
            event = %with_prefix(&self.prefix, tag),
            payload = %String::from_utf8_lossy(payload),
            "publish"
        );
    }
}
