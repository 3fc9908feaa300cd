use tokio::sync::Mutex;

use crate::storage::{
    INDEX_EMAILS, INDEX_LOGIN_NAME, INDEX_RESET_PASSWORD_TOKEN, KeyValueIndex, StorageDriver,
};
use crate::userdb::errors::UserError;
use crate::userdb::types::{User, UserSearchField};

/// The fields that must have at most one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UniqueField {
    Email,
    LoginName,
    ResetPasswordToken,
}

impl UniqueField {
    // Conflict checks run in this order, so email conflicts win over login
    // name conflicts.
    const ALL: [Self; 3] = [Self::Email, Self::LoginName, Self::ResetPasswordToken];

    fn value(self, user: &User) -> Option<&str> {
        let value = match self {
            Self::Email => Some(user.email.as_str()),
            Self::LoginName => Some(user.login_name.as_str()),
            Self::ResetPasswordToken => user.reset_password_token.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }

    fn taken(self) -> UserError {
        match self {
            Self::Email => UserError::EmailAlreadyTaken,
            Self::LoginName => UserError::LoginNameAlreadyTaken,
            Self::ResetPasswordToken => UserError::ResetPasswordTokenAlreadyTaken,
        }
    }
}

/// Backend-agnostic user store.
///
/// Users are kept as JSON blobs keyed by id, and three indexes map login
/// names, emails and reset tokens back to the owning id. All uniqueness rules
/// are enforced here; drivers only provide the primitives.
pub struct UserStore<D: StorageDriver> {
    driver: D,
    login_names: D::Index,
    emails: D::Index,
    reset_password_tokens: D::Index,
    save_lock: Mutex<()>,
}

impl<D: StorageDriver> UserStore<D> {
    pub fn new(driver: D) -> Self {
        let login_names = driver.index(INDEX_LOGIN_NAME);
        let emails = driver.index(INDEX_EMAILS);
        let reset_password_tokens = driver.index(INDEX_RESET_PASSWORD_TOKEN);

        Self {
            driver,
            login_names,
            emails,
            reset_password_tokens,
            save_lock: Mutex::new(()),
        }
    }

    fn index(&self, field: UniqueField) -> &D::Index {
        match field {
            UniqueField::Email => &self.emails,
            UniqueField::LoginName => &self.login_names,
            UniqueField::ResetPasswordToken => &self.reset_password_tokens,
        }
    }

    /// Create or update a user.
    ///
    /// Fails without touching the backend when a required field is empty or a
    /// unique value already belongs to another user. New index entries are
    /// claimed before the blob is written and stale entries are released
    /// last, so every entry written points at a user that holds its key.
    ///
    /// An index entry whose owner no longer holds the value (the blob is
    /// missing or has moved on) is a leftover of an interrupted save and is
    /// reclaimed instead of blocking the value forever.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn save(&self, user: &User) -> Result<(), UserError> {
        validate(user)?;

        let _guard = self.save_lock.lock().await;

        for field in UniqueField::ALL {
            if let Some(key) = field.value(user) {
                if let Some(owner) = self.other_owner(field, key, &user.id).await? {
                    tracing::info!(field = ?field, owner = %owner, "Unique value already taken");
                    return Err(field.taken());
                }
            }
        }

        let old_user = self.load(&user.id).await?;

        let acquired = self.claim_all(user, old_user.as_ref()).await?;

        let data = serde_json::to_string(user)?;
        if let Err(e) = self.driver.set(&user.id, &data).await {
            self.release_all(&acquired, &user.id).await;
            return Err(e.into());
        }

        // A writer in another process may have reclaimed one of our entries
        // before the blob existed
        match self.lost_claim(user).await {
            Ok(None) => {}
            Ok(Some(field)) => {
                tracing::warn!(field = ?field, "Unique value reclaimed by a concurrent writer");
                self.roll_back(user, old_user.as_ref(), &acquired).await;
                return Err(field.taken());
            }
            Err(e) => {
                self.roll_back(user, old_user.as_ref(), &acquired).await;
                return Err(e);
            }
        }

        if let Some(old_user) = &old_user {
            self.release_stale(old_user, user).await;
        }

        tracing::debug!(created = old_user.is_none(), "User saved");
        Ok(())
    }

    /// Load a user by id.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, user_id: &str) -> Result<User, UserError> {
        if user_id.is_empty() {
            return Err(UserError::InvalidUserObject(
                "user id must not be empty".to_string(),
            ));
        }
        self.load(user_id).await?.ok_or(UserError::NotFound)
    }

    pub async fn find_by_login_name(&self, login_name: &str) -> Result<User, UserError> {
        self.find_by(&UserSearchField::LoginName(login_name.to_string()))
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<User, UserError> {
        self.find_by(&UserSearchField::Email(email.to_string()))
            .await
    }

    pub async fn find_by_reset_password_token(&self, token: &str) -> Result<User, UserError> {
        self.find_by(&UserSearchField::ResetPasswordToken(token.to_string()))
            .await
    }

    /// Locate a user through its id or one of the unique indexes.
    #[tracing::instrument(skip(self), fields(user_field = %field))]
    pub async fn find_by(&self, field: &UserSearchField) -> Result<User, UserError> {
        let (field, key) = match field {
            UserSearchField::Id(id) => return self.get(id).await,
            UserSearchField::LoginName(key) => (UniqueField::LoginName, key),
            UserSearchField::Email(key) => (UniqueField::Email, key),
            UserSearchField::ResetPasswordToken(key) => (UniqueField::ResetPasswordToken, key),
        };

        let user_id = self
            .index(field)
            .lookup(key)
            .await?
            .ok_or(UserError::NotFound)?;
        let user = self.load(&user_id).await?.ok_or(UserError::NotFound)?;

        // An entry left behind by an interrupted save no longer matches its owner
        if field.value(&user) != Some(key.as_str()) {
            tracing::warn!(user_id = %user_id, field = ?field, "Ignoring stale index entry");
            return Err(UserError::NotFound);
        }
        Ok(user)
    }

    async fn load(&self, user_id: &str) -> Result<Option<User>, UserError> {
        match self.driver.lookup(user_id).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Whether the blob of `owner` still carries `key` in `field`.
    async fn holds(&self, field: UniqueField, key: &str, owner: &str) -> Result<bool, UserError> {
        let user = self.load(owner).await?;
        Ok(user.is_some_and(|user| field.value(&user) == Some(key)))
    }

    /// The live owner of `key` other than `user_id`, if any. A leftover
    /// entry is released on the way and reported as free.
    async fn other_owner(
        &self,
        field: UniqueField,
        key: &str,
        user_id: &str,
    ) -> Result<Option<String>, UserError> {
        let Some(owner) = self.index(field).lookup(key).await? else {
            return Ok(None);
        };
        if owner == user_id {
            return Ok(None);
        }
        if self.holds(field, key, &owner).await? {
            return Ok(Some(owner));
        }

        tracing::warn!(owner = %owner, field = ?field, "Releasing leftover index entry");
        self.index(field).release(key, &owner).await?;
        Ok(None)
    }

    /// Claim `key` for `user_id`, retrying once after releasing a leftover
    /// entry.
    async fn claim(&self, field: UniqueField, key: &str, user_id: &str) -> Result<bool, UserError> {
        if self.index(field).claim(key, user_id).await? {
            return Ok(true);
        }
        if self.other_owner(field, key, user_id).await?.is_some() {
            return Ok(false);
        }
        Ok(self.index(field).claim(key, user_id).await?)
    }

    /// First unique value of `user` whose index entry no longer points at it.
    async fn lost_claim(&self, user: &User) -> Result<Option<UniqueField>, UserError> {
        for field in UniqueField::ALL {
            if let Some(key) = field.value(user) {
                let owner = self.index(field).lookup(key).await?;
                if owner.as_deref() != Some(user.id.as_str()) {
                    return Ok(Some(field));
                }
            }
        }
        Ok(None)
    }

    /// Put back the previous blob (or drop the new one) and release the
    /// claims made by this save.
    async fn roll_back(
        &self,
        user: &User,
        old_user: Option<&User>,
        acquired: &[(UniqueField, &str)],
    ) {
        let restored = match old_user {
            Some(old_user) => match serde_json::to_string(old_user) {
                Ok(data) => self.driver.set(&user.id, &data).await.map_err(UserError::from),
                Err(e) => Err(e.into()),
            },
            None => self.driver.delete(&user.id).await.map_err(UserError::from),
        };
        if let Err(e) = restored {
            tracing::error!(error = %e, "Failed to restore user blob");
        }
        self.release_all(acquired, &user.id).await;
    }

    /// Claim every unique value of `user`, returning the entries that were
    /// newly acquired. On any failure the new claims are released again.
    async fn claim_all<'a>(
        &self,
        user: &'a User,
        old_user: Option<&User>,
    ) -> Result<Vec<(UniqueField, &'a str)>, UserError> {
        let mut acquired = Vec::new();

        for field in UniqueField::ALL {
            let Some(key) = field.value(user) else {
                continue;
            };

            let claimed = match self.claim(field, key, &user.id).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    self.release_all(&acquired, &user.id).await;
                    return Err(e);
                }
            };

            if !claimed {
                // Another writer won the race after our pre-check
                tracing::warn!(field = ?field, "Lost unique value claim to a concurrent writer");
                self.release_all(&acquired, &user.id).await;
                return Err(field.taken());
            }

            let already_owned = old_user.and_then(|old| field.value(old)) == Some(key);
            if !already_owned {
                acquired.push((field, key));
            }
        }

        Ok(acquired)
    }

    async fn release_all(&self, acquired: &[(UniqueField, &str)], user_id: &str) {
        for (field, key) in acquired {
            if let Err(e) = self.index(*field).release(key, user_id).await {
                tracing::warn!(error = %e, field = ?field, "Failed to roll back index claim");
            }
        }
    }

    /// Drop entries for values `user` gave up. The new state is already
    /// stored, so failures only leave leftovers behind.
    async fn release_stale(&self, old_user: &User, user: &User) {
        for field in UniqueField::ALL {
            let Some(old_key) = field.value(old_user) else {
                continue;
            };
            if field.value(user) == Some(old_key) {
                continue;
            }
            if let Err(e) = self.index(field).release(old_key, &user.id).await {
                tracing::warn!(error = %e, field = ?field, "Failed to release stale index entry");
            }
        }
    }
}

fn validate(user: &User) -> Result<(), UserError> {
    if user.id.is_empty() {
        return Err(UserError::InvalidUserObject("id is empty".to_string()));
    }
    if user.email.is_empty() {
        return Err(UserError::InvalidUserObject("email is empty".to_string()));
    }
    if user.login_name.is_empty() {
        return Err(UserError::InvalidUserObject(
            "login name is empty".to_string(),
        ));
    }
    if user.reset_password_token.as_deref() == Some("") {
        return Err(UserError::InvalidUserObject(
            "reset password token is present but empty".to_string(),
        ));
    }
    Ok(())
}
