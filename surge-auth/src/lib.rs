//! Capability token issuance and verification
//!
//! A capability token is a signed, time-boxed claim set authorizing one
//! run. It is held by an untrusted orchestrator, so every execution site
//! re-verifies it on every batch call: signature, expiry, and consistency
//! of the call's (url, count) with the claims. Verification is stateless
//! and synchronous so it can sit on the hot dispatch path.

pub mod error;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use token::{CapabilityClaims, TokenService};
