use thiserror::Error;

use crate::storage::StorageError;

#[derive(Clone, Error, Debug)]
pub enum UserError {
    #[error("Invalid user object: {0}")]
    InvalidUserObject(String),

    #[error("User not found")]
    NotFound,

    #[error("The given email address is already taken")]
    EmailAlreadyTaken,

    #[error("The given login name is already taken")]
    LoginNameAlreadyTaken,

    #[error("The given reset password token is already taken")]
    ResetPasswordTokenAlreadyTaken,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for UserError {
    fn from(err: serde_json::Error) -> Self {
        UserError::InvalidData(err.to_string())
    }
}
