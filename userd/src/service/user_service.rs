use serde_json::json;
use std::sync::Arc;

use super::errors::ServiceError;
use super::types::{Dependencies, ServiceConfig};
use crate::events::{
    USER_AUTHENTICATED, USER_CREATED, USER_EMAIL_CHANGED, USER_EMAIL_VERIFIED,
    USER_LOGIN_CREDENTIALS_CHANGED, USER_LOGIN_CREDENTIALS_RESET, USER_PASSWORD_CHANGED,
    USER_PROFILE_NAME_CHANGED, USER_RESET_TOKEN_CREATED,
};
use crate::storage::{Backend, StorageDriver};
use crate::userdb::{User, UserError, UserSearchField, UserStore};

/// Business operations on user accounts.
///
/// Every update is a read-modify-write through the [`UserStore`], which
/// re-checks uniqueness on each save. Successful mutations publish an event;
/// publishing never affects the result of the operation.
pub struct UserService<D: StorageDriver = Backend> {
    store: UserStore<D>,
    deps: Dependencies,
    config: ServiceConfig,
}

impl<D: StorageDriver> UserService<D> {
    pub fn new(store: UserStore<D>, deps: Dependencies, config: ServiceConfig) -> Self {
        Self {
            store,
            deps,
            config,
        }
    }

    pub fn store(&self) -> &UserStore<D> {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Create an unverified user and return its new id.
    #[tracing::instrument(skip(self, login_password))]
    pub async fn create_user(
        &self,
        profile_name: &str,
        email: &str,
        login_name: &str,
        login_password: &str,
    ) -> Result<String, ServiceError> {
        require("profile_name", profile_name)?;
        require("email", email)?;
        require("login_name", login_name)?;
        require("login_password", login_password)?;

        let password_hash = self.hash_password(login_password).await?;
        let user_id = self.deps.id_factory.new_user_id()?;

        let user = User::new(
            user_id.clone(),
            profile_name.to_string(),
            email.to_string(),
            login_name.to_string(),
            password_hash,
        );
        self.store.save(&user).await?;

        tracing::info!(user_id = %user_id, "User created");
        self.publish(
            USER_CREATED,
            json!({ "user_id": user_id, "email": email, "login_name": login_name }),
        );
        Ok(user_id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, user_id: &str) -> Result<User, ServiceError> {
        require("user_id", user_id)?;
        Ok(self.store.get(user_id).await?)
    }

    #[tracing::instrument(skip(self, new_login_password))]
    pub async fn change_login_credentials(
        &self,
        user_id: &str,
        new_login_name: &str,
        new_login_password: &str,
    ) -> Result<(), ServiceError> {
        require("login_name", new_login_name)?;
        require("login_password", new_login_password)?;

        let password_hash = self.hash_password(new_login_password).await?;
        self.read_modify_write(user_id, |user| {
            user.login_name = new_login_name.to_string();
            user.login_password_hash = password_hash;
            Ok(())
        })
        .await?;

        self.publish(
            USER_LOGIN_CREDENTIALS_CHANGED,
            json!({ "user_id": user_id, "login_name": new_login_name }),
        );
        Ok(())
    }

    #[tracing::instrument(skip(self, new_password))]
    pub async fn change_password(
        &self,
        user_id: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        require("login_password", new_password)?;

        let password_hash = self.hash_password(new_password).await?;
        self.read_modify_write(user_id, |user| {
            user.login_password_hash = password_hash;
            Ok(())
        })
        .await?;

        self.publish(USER_PASSWORD_CHANGED, json!({ "user_id": user_id }));
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_profile_name(
        &self,
        user_id: &str,
        profile_name: &str,
    ) -> Result<(), ServiceError> {
        require("profile_name", profile_name)?;

        self.read_modify_write(user_id, |user| {
            user.profile_name = profile_name.to_string();
            Ok(())
        })
        .await?;

        self.publish(
            USER_PROFILE_NAME_CHANGED,
            json!({ "user_id": user_id, "profile_name": profile_name }),
        );
        Ok(())
    }

    /// Replace the email address. The verification flag is left as it is.
    #[tracing::instrument(skip(self))]
    pub async fn change_email(&self, user_id: &str, email: &str) -> Result<(), ServiceError> {
        require("email", email)?;

        self.read_modify_write(user_id, |user| {
            user.email = email.to_string();
            Ok(())
        })
        .await?;

        self.publish(
            USER_EMAIL_CHANGED,
            json!({ "user_id": user_id, "email": email }),
        );
        Ok(())
    }

    /// Check login credentials and return the user id.
    ///
    /// A stored hash the hasher considers outdated is replaced on success.
    /// That save is housekeeping: its failure is logged and ignored.
    #[tracing::instrument(skip(self, login_password))]
    pub async fn authenticate(
        &self,
        login_name: &str,
        login_password: &str,
    ) -> Result<String, ServiceError> {
        require("login_name", login_name)?;
        require("login_password", login_password)?;

        let user = self.store.find_by_login_name(login_name).await?;

        if self.config.auth_email_must_be_verified && !user.email_verified {
            return Err(ServiceError::UserEmailMustBeVerified);
        }

        if !self
            .verify_password(login_password, &user.login_password_hash)
            .await?
        {
            return Err(ServiceError::InvalidCredentials);
        }

        if self.deps.hasher.needs_rehash(&user.login_password_hash) {
            self.rehash_best_effort(&user.id, &user.login_password_hash, login_password)
                .await;
        }

        self.publish(USER_AUTHENTICATED, json!({ "user_id": user.id }));
        Ok(user.id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_email_verified(&self, user_id: &str) -> Result<(), ServiceError> {
        let user = self
            .read_modify_write(user_id, |user| {
                user.email_verified = true;
                Ok(())
            })
            .await?;

        self.publish(
            USER_EMAIL_VERIFIED,
            json!({ "user_id": user_id, "email": user.email }),
        );
        Ok(())
    }

    /// Mark the email verified, provided `email` is still the user's address.
    #[tracing::instrument(skip(self))]
    pub async fn check_and_set_email_verified(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<(), ServiceError> {
        require("email", email)?;

        self.read_modify_write(user_id, |user| {
            if user.email != email {
                return Err(ServiceError::InvalidVerificationEmail);
            }
            user.email_verified = true;
            Ok(())
        })
        .await?;

        self.publish(
            USER_EMAIL_VERIFIED,
            json!({ "user_id": user_id, "email": email }),
        );
        Ok(())
    }

    /// Issue a reset token for the user owning `email`.
    ///
    /// The caller delivers the token out of band.
    pub async fn new_reset_login_credentials_token(
        &self,
        email: &str,
    ) -> Result<String, ServiceError> {
        self.new_reset_login_credentials_token_by(&[UserSearchField::Email(email.to_string())])
            .await
    }

    /// Issue a reset token for the user that every field in `fields`
    /// resolves to. Fields resolving to different users are rejected.
    #[tracing::instrument(skip(self, fields))]
    pub async fn new_reset_login_credentials_token_by(
        &self,
        fields: &[UserSearchField],
    ) -> Result<String, ServiceError> {
        if fields.is_empty() {
            return Err(ServiceError::InvalidArguments(
                "an email or login name is required".to_string(),
            ));
        }

        let mut found: Option<User> = None;
        for field in fields {
            require_search_field(field)?;
            let user = self.store.find_by(field).await?;
            if found.as_ref().is_some_and(|previous| previous.id != user.id) {
                return Err(ServiceError::InvalidArguments(format!(
                    "{field} belongs to a different user"
                )));
            }
            if found.is_none() {
                found = Some(user);
            }
        }
        let Some(mut user) = found else {
            return Err(ServiceError::InvalidArguments(
                "an email or login name is required".to_string(),
            ));
        };

        let token = self.deps.id_factory.new_reset_password_token()?;
        user.reset_password_token = Some(token.clone());
        user.reset_password_token_issued = Some(self.deps.clock.now());
        self.store.save(&user).await?;

        tracing::info!(user_id = %user.id, "Reset password token issued");
        self.publish(USER_RESET_TOKEN_CREATED, json!({ "user_id": user.id }));
        Ok(token)
    }

    /// Replace the login credentials of the user holding `token` and return
    /// its id. The token is consumed.
    #[tracing::instrument(skip(self, token, new_login_password))]
    pub async fn reset_credentials_with_token(
        &self,
        token: &str,
        new_login_name: &str,
        new_login_password: &str,
    ) -> Result<String, ServiceError> {
        require("token", token)?;
        require("login_name", new_login_name)?;
        require("login_password", new_login_password)?;

        // Unknown tokens look like bad input so callers cannot test which tokens exist
        let mut user = match self.store.find_by_reset_password_token(token).await {
            Ok(user) => user,
            Err(UserError::NotFound) => {
                return Err(ServiceError::InvalidArguments(
                    "invalid reset password token".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let expired = match user.reset_password_token_issued {
            Some(issued) => {
                self.deps.clock.now().signed_duration_since(issued) > self.config.reset_token_expiry
            }
            None => true,
        };
        if expired {
            tracing::info!(user_id = %user.id, "Reset password token expired");
            return Err(ServiceError::ResetPasswordTokenExpired);
        }

        user.login_name = new_login_name.to_string();
        user.login_password_hash = self.hash_password(new_login_password).await?;
        user.reset_password_token = None;
        user.reset_password_token_issued = None;
        self.store.save(&user).await?;

        tracing::info!(user_id = %user.id, "Login credentials reset");
        self.publish(
            USER_LOGIN_CREDENTIALS_RESET,
            json!({ "user_id": user.id, "login_name": new_login_name }),
        );
        Ok(user.id)
    }

    async fn read_modify_write<F>(&self, user_id: &str, modify: F) -> Result<User, ServiceError>
    where
        F: FnOnce(&mut User) -> Result<(), ServiceError>,
    {
        require("user_id", user_id)?;

        let mut user = self.store.get(user_id).await?;
        modify(&mut user)?;
        self.store.save(&user).await?;
        Ok(user)
    }

    /// Replace `verified_hash` with a fresh hash of `login_password`.
    ///
    /// The user is re-read after hashing and left alone when its hash changed
    /// in the meantime, so a concurrent update is never reverted.
    async fn rehash_best_effort(&self, user_id: &str, verified_hash: &str, login_password: &str) {
        let hash = match self.hash_password(login_password).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to rehash password");
                return;
            }
        };

        let mut user = match self.store.get(user_id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to reload user for rehash");
                return;
            }
        };
        if user.login_password_hash != verified_hash {
            tracing::debug!(user_id, "Password hash changed concurrently, skipping rehash");
            return;
        }

        user.login_password_hash = hash;
        match self.store.save(&user).await {
            Ok(()) => tracing::info!(user_id, "Password hash upgraded"),
            Err(e) => tracing::warn!(user_id, error = %e, "Failed to save rehashed password"),
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String, ServiceError> {
        let hasher = Arc::clone(&self.deps.hasher);
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password)).await??;
        Ok(hash)
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ServiceError> {
        let hasher = Arc::clone(&self.deps.hasher);
        let password = password.to_string();
        let hash = hash.to_string();
        Ok(tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await?)
    }

    fn publish(&self, tag: &str, payload: serde_json::Value) {
        self.deps.events.publish(tag, payload.to_string().as_bytes());
    }
}

fn require(name: &str, value: &str) -> Result<(), ServiceError> {
    if value.is_empty() {
        return Err(ServiceError::InvalidArguments(format!(
            "{name} must not be empty"
        )));
    }
    Ok(())
}

fn require_search_field(field: &UserSearchField) -> Result<(), ServiceError> {
    match field {
        UserSearchField::Id(value) => require("user_id", value),
        UserSearchField::LoginName(value) => require("login_name", value),
        UserSearchField::Email(value) => require("email", value),
        UserSearchField::ResetPasswordToken(value) => require("token", value),
    }
}
