//! Credential models, redacted secrets, and the auth endpoint payloads.

pub mod credential;
pub mod secret;
pub mod wire;

pub use credential::*;
pub use secret::*;
pub use wire::*;
