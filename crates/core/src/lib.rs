//! `gatekeeper-core`: permission domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod permission;

pub use error::{AccessError, AccessResult, ConflictKind, EntityKind};
pub use id::{PermissionId, UserId};
pub use permission::{Grant, NewPermission, Permission};
