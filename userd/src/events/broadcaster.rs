use std::sync::Arc;

use super::EventStream;

/// Forwards every event to each registered stream.
#[derive(Default, Clone)]
pub struct Broadcaster {
    streams: Vec<Arc<dyn EventStream>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stream(&mut self, stream: Arc<dyn EventStream>) {
        self.streams.push(stream);
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl EventStream for Broadcaster {
    fn publish(&self, tag: &str, payload: &[u8]) {
        for stream in &self.streams {
            stream.publish(tag, payload);
        }
    }
}
