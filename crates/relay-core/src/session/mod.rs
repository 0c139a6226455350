//! Session state
//!
//! One [`SessionContext`] per client connection, kept in a [`SessionStore`].

mod context;
mod store;

pub use context::{ChatMessage, MessageRole, SessionContext};
pub use store::{SessionId, SessionStore, SharedSession};
