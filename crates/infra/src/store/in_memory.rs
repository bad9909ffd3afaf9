use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;

use gatekeeper_auth::Role;
use gatekeeper_core::{EntityKind, Grant, NewPermission, Permission, PermissionId, UserId};

use super::{CatalogStore, GrantStore, PermissionStore, StoreError, StoreResult, UserDirectory};
use crate::fallback::FallbackCatalog;

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<UserId, Role>,
    catalog: BTreeMap<PermissionId, Permission>,
    grants: BTreeSet<Grant>,
    last_id: i64,
}

/// In-memory store for tests/dev.
///
/// Every mutation takes the single write lock for both its existence checks
/// and its write, so check-then-act cannot interleave. The availability flag
/// and optional latency simulate an unreachable or slow backend.
#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<State>,
    available: AtomicBool,
    latency: Option<Duration>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            available: AtomicBool::new(true),
            latency: None,
        }
    }

    /// Store pre-populated with a catalog table and a user list.
    pub fn seeded(
        catalog: &FallbackCatalog,
        users: impl IntoIterator<Item = (UserId, Role)>,
    ) -> Self {
        let mut state = State::default();
        for permission in catalog.permissions() {
            state.last_id = state.last_id.max(permission.id.get());
            state.catalog.insert(permission.id, permission);
        }
        state.users.extend(users);

        Self {
            state: RwLock::new(state),
            ..Self::new()
        }
    }

    /// Delay every call by `latency` before touching state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Register a user (user-management collaborator side).
    pub fn add_user(&self, user_id: UserId, role: Role) -> StoreResult<()> {
        self.write()?.users.insert(user_id, role);
        Ok(())
    }

    /// Delete a user, cascading its grants. Returns whether the user existed.
    pub fn remove_user(&self, user_id: UserId) -> StoreResult<bool> {
        let mut state = self.write()?;
        let existed = state.users.remove(&user_id).is_some();
        state.grants.retain(|g| g.user_id != user_id);
        Ok(existed)
    }

    /// Every stored grant, in `(user, permission)` order.
    pub fn grants(&self) -> StoreResult<Vec<Grant>> {
        Ok(self.read()?.grants.iter().copied().collect())
    }

    async fn enter(&self) -> StoreResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if !self.is_available() {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

fn user_range(user_id: UserId) -> std::ops::RangeInclusive<Grant> {
    Grant::new(user_id, PermissionId::new(i64::MIN))..=Grant::new(user_id, PermissionId::new(i64::MAX))
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn define(&self, permission: NewPermission) -> StoreResult<Permission> {
        self.enter().await?;
        let mut state = self.write()?;

        if state.catalog.values().any(|p| p.name == permission.name()) {
            return Err(StoreError::DuplicateName);
        }

        state.last_id += 1;
        let entry = permission.with_id(PermissionId::new(state.last_id));
        state.catalog.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn list(&self) -> StoreResult<Vec<Permission>> {
        self.enter().await?;
        Ok(self.read()?.catalog.values().cloned().collect())
    }

    async fn exists(&self, id: PermissionId) -> StoreResult<bool> {
        self.enter().await?;
        Ok(self.read()?.catalog.contains_key(&id))
    }
}

#[async_trait]
impl GrantStore for InMemoryStore {
    async fn grant(&self, grant: Grant) -> StoreResult<()> {
        self.enter().await?;
        let mut state = self.write()?;

        if !state.users.contains_key(&grant.user_id) {
            return Err(StoreError::NotFound(EntityKind::User));
        }
        if !state.catalog.contains_key(&grant.permission_id) {
            return Err(StoreError::NotFound(EntityKind::Permission));
        }
        if !state.grants.insert(grant) {
            return Err(StoreError::AlreadyGranted);
        }
        Ok(())
    }

    async fn revoke(&self, grant: Grant) -> StoreResult<()> {
        self.enter().await?;
        if !self.write()?.grants.remove(&grant) {
            return Err(StoreError::NotGranted);
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: UserId) -> StoreResult<Vec<Permission>> {
        self.enter().await?;
        let state = self.read()?;

        state
            .grants
            .range(user_range(user_id))
            .map(|g| {
                state.catalog.get(&g.permission_id).cloned().ok_or_else(|| {
                    StoreError::Corrupt(format!("grant references missing permission {}", g.permission_id))
                })
            })
            .collect()
    }

    async fn has(&self, grant: Grant) -> StoreResult<bool> {
        self.enter().await?;
        Ok(self.read()?.grants.contains(&grant))
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool> {
        self.enter().await?;
        Ok(self.read()?.users.contains_key(&user_id))
    }

    async fn role_of(&self, user_id: UserId) -> StoreResult<Option<Role>> {
        self.enter().await?;
        Ok(self.read()?.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl PermissionStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.enter().await
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}
