//! Catalog, relation and user-directory storage abstractions.
//!
//! The store is the only owner of the authoritative grant set. Every
//! implementation must make `grant` and `revoke` atomic with respect to the
//! existence checks they perform: two identical concurrent requests resolve to
//! one success and one `AlreadyGranted` / `NotGranted`, never two successes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use gatekeeper_auth::Role;
use gatekeeper_core::{
    AccessError, ConflictKind, EntityKind, Grant, NewPermission, Permission, PermissionId, UserId,
};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Store operation error.
///
/// ## Error Categories
///
/// - **Connectivity** (`Unavailable`, `Timeout`): the store could not be reached
///   in time. These are the only errors the degraded-mode policy may absorb.
/// - **Logic** (`NotFound`, `AlreadyGranted`, `NotGranted`, `DuplicateName`):
///   deterministic outcomes of the request against current state.
/// - **Corrupt**: the store answered with something it should never produce.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} not found")]
    NotFound(EntityKind),

    #[error("permission already granted")]
    AlreadyGranted,

    #[error("permission not granted")]
    NotGranted,

    #[error("permission name already exists")]
    DuplicateName,

    #[error("corrupt store state: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether this error means "the store could not be reached".
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

impl From<StoreError> for AccessError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(msg) => AccessError::ServiceUnavailable(msg),
            timeout @ StoreError::Timeout(_) => AccessError::ServiceUnavailable(timeout.to_string()),
            StoreError::NotFound(kind) => AccessError::NotFound(kind),
            StoreError::AlreadyGranted => AccessError::Conflict(ConflictKind::AlreadyGranted),
            StoreError::NotGranted => AccessError::NotFound(EntityKind::Grant),
            StoreError::DuplicateName => AccessError::Conflict(ConflictKind::DuplicateName),
            StoreError::Corrupt(msg) => AccessError::Internal(msg),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Permission catalog: append-only set of permission definitions.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Allocate a new id and persist the entry. Fails with `DuplicateName` on
    /// an exact (case-sensitive) name match.
    async fn define(&self, permission: NewPermission) -> StoreResult<Permission>;

    /// All entries, sorted by id ascending.
    async fn list(&self) -> StoreResult<Vec<Permission>>;

    async fn exists(&self, id: PermissionId) -> StoreResult<bool>;
}

/// The user↔permission relation.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Insert the pair. Fails with `NotFound(User)`, `NotFound(Permission)` or
    /// `AlreadyGranted`.
    async fn grant(&self, grant: Grant) -> StoreResult<()>;

    /// Remove the pair. Fails with `NotGranted` if absent.
    async fn revoke(&self, grant: Grant) -> StoreResult<()>;

    /// The user's granted permissions joined with the catalog, sorted by id.
    async fn list_for_user(&self, user_id: UserId) -> StoreResult<Vec<Permission>>;

    async fn has(&self, grant: Grant) -> StoreResult<bool>;
}

/// Read-only view of the user-management collaborator.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool>;

    async fn role_of(&self, user_id: UserId) -> StoreResult<Option<Role>>;
}

/// A single backend serving catalog, relation and directory.
#[async_trait]
pub trait PermissionStore: CatalogStore + GrantStore + UserDirectory {
    /// Cheap reachability probe.
    async fn ping(&self) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn define(&self, permission: NewPermission) -> StoreResult<Permission> {
        (**self).define(permission).await
    }

    async fn list(&self) -> StoreResult<Vec<Permission>> {
        (**self).list().await
    }

    async fn exists(&self, id: PermissionId) -> StoreResult<bool> {
        (**self).exists(id).await
    }
}

#[async_trait]
impl<S> GrantStore for Arc<S>
where
    S: GrantStore + ?Sized,
{
    async fn grant(&self, grant: Grant) -> StoreResult<()> {
        (**self).grant(grant).await
    }

    async fn revoke(&self, grant: Grant) -> StoreResult<()> {
        (**self).revoke(grant).await
    }

    async fn list_for_user(&self, user_id: UserId) -> StoreResult<Vec<Permission>> {
        (**self).list_for_user(user_id).await
    }

    async fn has(&self, grant: Grant) -> StoreResult<bool> {
        (**self).has(grant).await
    }
}

#[async_trait]
impl<S> UserDirectory for Arc<S>
where
    S: UserDirectory + ?Sized,
{
    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool> {
        (**self).user_exists(user_id).await
    }

    async fn role_of(&self, user_id: UserId) -> StoreResult<Option<Role>> {
        (**self).role_of(user_id).await
    }
}

#[async_trait]
impl<S> PermissionStore for Arc<S>
where
    S: PermissionStore + ?Sized,
{
    async fn ping(&self) -> StoreResult<()> {
        (**self).ping().await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}
