use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use userd::{
    Argon2Hasher, Clock, Dependencies, EventCollector, InMemoryDriver, SequenceIdFactory,
    ServiceConfig, UserService, UserStore,
};

/// Clock moved by hand from the tests
#[derive(Debug)]
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub struct TestService {
    pub service: UserService<InMemoryDriver>,
    pub events: Arc<EventCollector>,
    pub clock: Arc<TestClock>,
}

impl TestService {
    pub fn event_tags(&self) -> Vec<String> {
        self.events.items().into_iter().map(|e| e.tag).collect()
    }
}

/// Memory-backed service with predictable ids and cheap hashing
pub fn test_service(config: ServiceConfig) -> TestService {
    let events = Arc::new(EventCollector::new(1000));
    let clock = Arc::new(TestClock::new());
    let deps = Dependencies {
        id_factory: Arc::new(SequenceIdFactory::new("user-")),
        hasher: Arc::new(Argon2Hasher::new(8, 1, 1).unwrap()),
        events: events.clone(),
        clock: clock.clone(),
    };
    TestService {
        service: UserService::new(UserStore::new(InMemoryDriver::new()), deps, config),
        events,
        clock,
    }
}
