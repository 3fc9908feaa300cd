use std::time::Duration;

use crate::common::{etcd_endpoint, redis_url, unique_suffix};
use userd::{
    Backend, EtcdConfig, INDEX_EMAILS, KeyValueIndex, StorageConfig, StorageDriver, User, UserError,
    UserStore,
};

fn user(id: &str, login_name: &str, email: &str) -> User {
    User::new(
        id.to_string(),
        "Test".to_string(),
        email.to_string(),
        login_name.to_string(),
        "hash".to_string(),
    )
}

/// Store behavior every backend must share
async fn exercise_store(backend: Backend) {
    let s = unique_suffix();
    exercise_driver_delete(&backend, &s).await;
    let leftover_email = format!("carol-{s}@example.com");
    backend
        .index(INDEX_EMAILS)
        .put(&leftover_email, &format!("crashed-{s}"))
        .await
        .unwrap();
    let store = UserStore::new(backend);

    // An entry without a blob behind it does not block a new owner
    let carol = user(&format!("c-{s}"), &format!("carol-{s}"), &leftover_email);
    store.save(&carol).await.unwrap();
    assert_eq!(store.find_by_email(&leftover_email).await.unwrap().id, carol.id);
    let a_id = format!("a-{s}");
    let b_id = format!("b-{s}");

    // Round trip
    let mut a = user(&a_id, &format!("alice-{s}"), &format!("alice-{s}@example.com"));
    store.save(&a).await.unwrap();
    assert_eq!(store.get(&a_id).await.unwrap(), a);
    assert_eq!(
        store.find_by_email(&a.email).await.unwrap().id,
        a_id
    );

    // Conflicts leave the owner alone
    let b = user(&b_id, &format!("bob-{s}"), &a.email);
    assert!(matches!(
        store.save(&b).await,
        Err(UserError::EmailAlreadyTaken)
    ));
    assert!(matches!(store.get(&b_id).await, Err(UserError::NotFound)));

    // Renames release the old login name
    let old_login = a.login_name.clone();
    a.login_name = format!("alice2-{s}");
    a.reset_password_token = Some(format!("token-{s}"));
    store.save(&a).await.unwrap();
    assert!(matches!(
        store.find_by_login_name(&old_login).await,
        Err(UserError::NotFound)
    ));
    assert_eq!(
        store
            .find_by_reset_password_token(&format!("token-{s}"))
            .await
            .unwrap()
            .id,
        a_id
    );

    let b = user(&b_id, &old_login, &format!("bob-{s}@example.com"));
    store.save(&b).await.unwrap();
    assert_eq!(store.find_by_login_name(&old_login).await.unwrap().id, b_id);
    assert!(matches!(
        store.get(&format!("missing-{s}")).await,
        Err(UserError::NotFound)
    ));
}

async fn exercise_driver_delete(backend: &Backend, s: &str) {
    let id = format!("gone-{s}");
    backend.set(&id, "{}").await.unwrap();
    backend.delete(&id).await.unwrap();
    backend.delete(&id).await.unwrap();
    assert!(backend.lookup(&id).await.unwrap().is_none());
}

/// Conditional index primitives every backend must share
async fn exercise_index(backend: Backend) {
    let s = unique_suffix();
    let index = backend.index("integration_test");
    let key = format!("key-{s}");

    assert!(index.claim(&key, "u1").await.unwrap());
    assert!(index.claim(&key, "u1").await.unwrap());
    assert!(!index.claim(&key, "u2").await.unwrap());
    assert_eq!(index.lookup(&key).await.unwrap().as_deref(), Some("u1"));

    index.release(&key, "u2").await.unwrap();
    assert_eq!(index.lookup(&key).await.unwrap().as_deref(), Some("u1"));

    index.release(&key, "u1").await.unwrap();
    assert_eq!(index.lookup(&key).await.unwrap(), None);

    index.put(&key, "u3").await.unwrap();
    assert_eq!(index.lookup(&key).await.unwrap().as_deref(), Some("u3"));
    index.remove(&key).await.unwrap();
    index.remove(&key).await.unwrap();
    assert_eq!(index.lookup(&key).await.unwrap(), None);
}

async fn connect(config: StorageConfig) -> Backend {
    Backend::connect(&config).await.unwrap()
}

#[tokio::test]
async fn test_memory_backend() {
    exercise_store(connect(StorageConfig::Memory).await).await;
    exercise_index(connect(StorageConfig::Memory).await).await;
}

#[tokio::test]
async fn test_redis_backend() {
    let Some(url) = redis_url() else {
        eprintln!("USERD_TEST_REDIS_URL not set, skipping");
        return;
    };
    exercise_store(connect(StorageConfig::Redis { url: url.clone() }).await).await;
    exercise_index(connect(StorageConfig::Redis { url }).await).await;
}

#[tokio::test]
async fn test_etcd_backend() {
    let Some(endpoint) = etcd_endpoint() else {
        eprintln!("USERD_TEST_ETCD_ENDPOINT not set, skipping");
        return;
    };
    let config = StorageConfig::Etcd(EtcdConfig {
        endpoint,
        prefix: format!("userd-test-{}", unique_suffix()),
        ttl: Some(Duration::from_secs(600)),
    });
    exercise_store(connect(config.clone()).await).await;
    exercise_index(connect(config).await).await;
}
