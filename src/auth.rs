//! Requester identities and the credential payloads issued to them.

pub mod credential;
pub mod id;

pub use credential::*;
pub use id::*;
