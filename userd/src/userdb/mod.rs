mod errors;
mod store;
mod types;

pub use errors::UserError;
pub use store::UserStore;
pub use types::{User, UserSearchField};
