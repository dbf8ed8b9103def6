//! Authentication module
//!
//! Resolves the caller's identity, role and school from a signed session
//! token. Issuing tokens for real users belongs to the identity provider.

mod session;

pub use session::{Claims, Session, SessionProvider, SessionUser, SESSION_COOKIE};
