use std::sync::Once;

static LOAD_ENV: Once = Once::new();

fn test_var(key: &str) -> Option<String> {
    LOAD_ENV.call_once(|| {
        dotenvy::from_filename(".env_test").ok();
    });
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Redis used by backend tests, if configured
pub fn redis_url() -> Option<String> {
    test_var("USERD_TEST_REDIS_URL")
}

/// etcd JSON gateway used by backend tests, if configured
pub fn etcd_endpoint() -> Option<String> {
    test_var("USERD_TEST_ETCD_ENDPOINT")
}

/// Keeps keys of separate runs against a shared server apart
pub fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
