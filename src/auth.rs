//! Auth-domain models: redacted token secrets, JWT claims, and persisted sessions.

pub mod claims;
pub mod secret;
pub mod session;

pub use claims::*;
pub use secret::*;
pub use session::*;
