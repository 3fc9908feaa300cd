use thiserror::Error;

use crate::hasher::HasherError;
use crate::idfactory::IdFactoryError;
use crate::userdb::UserError;

/// Errors returned by [`UserService`](super::UserService) operations
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A required argument was missing or empty
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The email being verified is not the user's current email
    #[error("Email address does not match current email for user")]
    InvalidVerificationEmail,

    #[error("Email must be verified to authenticate")]
    UserEmailMustBeVerified,

    #[error("Reset password token expired")]
    ResetPasswordTokenExpired,

    /// Error from the user store
    #[error("User error: {0}")]
    User(UserError),

    #[error("Hasher error: {0}")]
    Hasher(HasherError),

    #[error("Id factory error: {0}")]
    IdFactory(IdFactoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Log the error and return self
    pub fn log(self) -> Self {
        match &self {
            Self::InvalidArguments(msg) => tracing::error!("Invalid arguments: {}", msg),
            Self::InvalidCredentials => tracing::error!("Invalid credentials"),
            Self::InvalidVerificationEmail => tracing::error!("Invalid verification email"),
            Self::UserEmailMustBeVerified => tracing::error!("Email must be verified"),
            Self::ResetPasswordTokenExpired => tracing::error!("Reset password token expired"),
            Self::User(err) => tracing::error!("User error: {}", err),
            Self::Hasher(err) => tracing::error!("Hasher error: {}", err),
            Self::IdFactory(err) => tracing::error!("Id factory error: {}", err),
            Self::Internal(msg) => tracing::error!("Internal error: {}", msg),
        }
        self
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::User(UserError::NotFound))
    }

    pub fn is_email_already_taken(&self) -> bool {
        matches!(self, Self::User(UserError::EmailAlreadyTaken))
    }

    pub fn is_login_name_already_taken(&self) -> bool {
        matches!(self, Self::User(UserError::LoginNameAlreadyTaken))
    }
}

// Store-origin errors are expected outcomes (not found, conflicts) and are
// left to the caller to log.
impl From<UserError> for ServiceError {
    fn from(err: UserError) -> Self {
        Self::User(err)
    }
}

impl From<HasherError> for ServiceError {
    fn from(err: HasherError) -> Self {
        let error = Self::Hasher(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<IdFactoryError> for ServiceError {
    fn from(err: IdFactoryError) -> Self {
        let error = Self::IdFactory(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        let error = Self::Internal(format!("Blocking task failed: {err}"));
        tracing::error!("{}", error);
        error
    }
}
