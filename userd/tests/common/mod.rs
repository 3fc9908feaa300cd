pub mod backends;
pub mod fixtures;

pub use backends::{etcd_endpoint, redis_url, unique_suffix};
pub use fixtures::{TestClock, TestService, test_service};
