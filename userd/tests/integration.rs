/// Integration tests for userd
///
/// The service flows run on the memory backend. Backend tests also run
/// against Redis and etcd when `USERD_TEST_REDIS_URL` or
/// `USERD_TEST_ETCD_ENDPOINT` is set (directly or in `.env_test`).
mod common;

mod integration {
    pub mod service_flows;
    pub mod storage_backends;
}
