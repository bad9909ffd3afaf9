//! Access-control error model.

use serde::Serialize;
use thiserror::Error;

/// Result type used across the permission core.
pub type AccessResult<T> = Result<T, AccessError>;

/// The kind of entity a `NotFound` refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Permission,
    Grant,
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            EntityKind::User => "user",
            EntityKind::Permission => "permission",
            EntityKind::Grant => "grant",
        })
    }
}

/// What a `Conflict` collided with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// A catalog entry with the same name already exists.
    DuplicateName,
    /// The `(user, permission)` pair is already granted.
    AlreadyGranted,
}

impl core::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ConflictKind::DuplicateName => "permission name already exists",
            ConflictKind::AlreadyGranted => "user already has this permission",
        })
    }
}

/// Caller-facing error taxonomy.
///
/// Every operation of the permission service resolves to either its success
/// payload or exactly one of these variants. Connectivity failures are their
/// own variant and are never inferred from message text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No valid credential was presented.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller is authenticated but its role does not allow the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(EntityKind),

    #[error("conflict: {0}")]
    Conflict(ConflictKind),

    /// The backing store is unreachable or timed out.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Malformed input (bad id, empty name, oversized description, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store answered with something it should never produce.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AccessError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: EntityKind) -> Self {
        Self::NotFound(kind)
    }

    pub fn conflict(kind: ConflictKind) -> Self {
        Self::Conflict(kind)
    }

    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::Unauthenticated(_) => "unauthenticated",
            AccessError::Forbidden(_) => "forbidden",
            AccessError::NotFound(_) => "not_found",
            AccessError::Conflict(ConflictKind::DuplicateName) => "duplicate_name",
            AccessError::Conflict(ConflictKind::AlreadyGranted) => "already_granted",
            AccessError::ServiceUnavailable(_) => "service_unavailable",
            AccessError::Validation(_) => "validation_error",
            AccessError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_entity() {
        assert_eq!(AccessError::not_found(EntityKind::User).to_string(), "user not found");
        assert_eq!(
            AccessError::conflict(ConflictKind::AlreadyGranted).to_string(),
            "conflict: user already has this permission"
        );
    }

    #[test]
    fn codes_distinguish_conflict_kinds() {
        assert_eq!(AccessError::conflict(ConflictKind::DuplicateName).code(), "duplicate_name");
        assert_eq!(AccessError::conflict(ConflictKind::AlreadyGranted).code(), "already_granted");
        assert_ne!(
            AccessError::Unauthenticated("x".into()).code(),
            AccessError::Forbidden("x".into()).code()
        );
    }
}
