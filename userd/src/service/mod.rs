//! Account operations layered on the user store

mod errors;
mod types;
mod user_service;

pub use errors::ServiceError;
pub use types::{DEFAULT_RESET_TOKEN_EXPIRY, Dependencies, ServiceConfig};
pub use user_service::UserService;
