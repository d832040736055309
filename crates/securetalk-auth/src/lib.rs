//! Salted-SHA-256 credential store used by the login and signup handlers.

mod error;
mod store;

pub use error::AuthError;
pub use store::{AuthOutcome, CreateOutcome, CredentialStore, DeleteOutcome};
