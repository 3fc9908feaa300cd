use async_trait::async_trait;

use crate::storage::errors::StorageError;

/// Index mapping login names to user ids
pub const INDEX_LOGIN_NAME: &str = "login_name";
/// Index mapping email addresses to user ids
pub const INDEX_EMAILS: &str = "emails";
/// Index mapping outstanding reset tokens to user ids
pub const INDEX_RESET_PASSWORD_TOKEN: &str = "reset_password_token";

/// Namespace of the primary user blobs
pub(crate) const USER_PREFIX: &str = "user";

/// Backend primitives a physical store has to provide.
///
/// Drivers only move opaque strings around. Serialization and the
/// one-owner-per-key rules live in [`crate::userdb::UserStore`].
#[async_trait]
pub trait StorageDriver: Send + Sync + 'static {
    type Index: KeyValueIndex;

    /// Unconditionally overwrite the blob stored under `primary_key`.
    async fn set(&self, primary_key: &str, value: &str) -> Result<(), StorageError>;

    /// Read the blob written by [`StorageDriver::set`]. Absence is `Ok(None)`.
    async fn lookup(&self, primary_key: &str) -> Result<Option<String>, StorageError>;

    /// Remove the blob under `primary_key`. Removing an absent blob is not
    /// an error.
    async fn delete(&self, primary_key: &str) -> Result<(), StorageError>;

    /// Handle to the named index. Handles obtained for the same name share
    /// their data.
    fn index(&self, name: &str) -> Self::Index;
}

/// A named mapping from a unique key to the owning user id.
#[async_trait]
pub trait KeyValueIndex: Send + Sync + 'static {
    /// Upsert `key -> user_id` without looking at the current owner.
    async fn put(&self, key: &str, user_id: &str) -> Result<(), StorageError>;

    /// Atomically take ownership of `key` for `user_id`.
    ///
    /// Returns `true` when the key was free (and is now set) or already
    /// belonged to `user_id`, `false` when another owner holds it. Nothing is
    /// written in the `false` case.
    async fn claim(&self, key: &str, user_id: &str) -> Result<bool, StorageError>;

    /// Delete `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Atomically delete `key` only while it still points to `user_id`.
    async fn release(&self, key: &str, user_id: &str) -> Result<(), StorageError>;

    /// Owner of `key`, if any.
    async fn lookup(&self, key: &str) -> Result<Option<String>, StorageError>;
}
