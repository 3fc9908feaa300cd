use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum HasherError {
    #[error("Invalid hasher parameters: {0}")]
    InvalidParams(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}
