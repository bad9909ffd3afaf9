//! `gatekeeper-auth`: authentication and authorization gate.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod principal;
pub mod roles;
pub mod token;

pub use authorize::{authorize, AuthzError, Gate, GatePolicy, OperationClass};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use principal::Principal;
pub use roles::Role;
pub use token::{Hs256TokenVerifier, TokenError, TokenVerifier};
