//! Permission service: gate check, store call, degraded-mode resolution.
//!
//! Every operation authorizes the principal before touching the store. Store
//! calls are bounded by a timeout; an elapsed timeout is a connectivity failure.
//! Reads that hit a connectivity failure degrade to a safe listing, writes
//! always surface it as `ServiceUnavailable`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::instrument;

use gatekeeper_auth::{authorize, GatePolicy, OperationClass, Principal};
use gatekeeper_core::{
    AccessError, AccessResult, EntityKind, Grant, NewPermission, Permission, PermissionId, UserId,
};

use crate::audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use crate::config::DEFAULT_STORE_TIMEOUT;
use crate::degraded::{classify, OperationKind, Resolution};
use crate::fallback::FallbackCatalog;
use crate::store::{PermissionStore, StoreError, StoreResult};

/// Whether a listing came from the store or from a degraded-mode default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Live,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub mode: ReadMode,
}

impl<T> Listing<T> {
    pub fn live(items: Vec<T>) -> Self {
        Self { items, mode: ReadMode::Live }
    }

    pub fn degraded(items: Vec<T>) -> Self {
        Self { items, mode: ReadMode::Degraded }
    }

    pub fn is_degraded(&self) -> bool {
        self.mode == ReadMode::Degraded
    }
}

/// Result of a store liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreHealth {
    pub backend: &'static str,
    pub up: bool,
}

#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn PermissionStore>,
    fallback: FallbackCatalog,
    policy: GatePolicy,
    audit: Arc<dyn AuditSink>,
    store_timeout: Duration,
}

impl PermissionService {
    pub fn new(store: Arc<dyn PermissionStore>, fallback: FallbackCatalog) -> Self {
        Self {
            store,
            fallback,
            policy: GatePolicy::default(),
            audit: Arc::new(NoopAuditSink),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub fn fallback(&self) -> &FallbackCatalog {
        &self.fallback
    }

    #[instrument(skip(self, principal), fields(actor = %principal.user_id))]
    pub async fn list_catalog(&self, principal: &Principal) -> AccessResult<Listing<Permission>> {
        authorize(&self.policy, principal, OperationClass::ReadPermissions)?;
        let result = self.bounded(self.store.list()).await;
        self.resolve_read(OperationKind::ListCatalog, result)
    }

    /// Grants of `user_id`, sorted by permission id. Unknown users have none.
    #[instrument(skip(self, principal), fields(actor = %principal.user_id))]
    pub async fn list_user_permissions(
        &self,
        principal: &Principal,
        user_id: UserId,
    ) -> AccessResult<Listing<Permission>> {
        authorize(&self.policy, principal, OperationClass::ReadUserPermissions)?;
        let result = self.bounded(self.store.list_for_user(user_id)).await;
        self.resolve_read(OperationKind::ListUserPermissions, result)
    }

    #[instrument(skip(self, principal), fields(actor = %principal.user_id))]
    pub async fn assign(
        &self,
        principal: &Principal,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AccessResult<Grant> {
        authorize(&self.policy, principal, OperationClass::MutatePermissions)?;
        let grant = Grant::new(user_id, permission_id);

        let result = self.try_assign(grant).await;
        self.audit_grant(principal, AuditAction::PermissionGranted, grant, &result);
        result.map(|()| grant)
    }

    #[instrument(skip(self, principal), fields(actor = %principal.user_id))]
    pub async fn revoke(
        &self,
        principal: &Principal,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AccessResult<Grant> {
        authorize(&self.policy, principal, OperationClass::MutatePermissions)?;
        let grant = Grant::new(user_id, permission_id);

        let result = self.try_revoke(grant).await;
        self.audit_grant(principal, AuditAction::PermissionRevoked, grant, &result);
        result.map(|()| grant)
    }

    #[instrument(skip(self, principal, description), fields(actor = %principal.user_id))]
    pub async fn define_catalog_entry(
        &self,
        principal: &Principal,
        name: &str,
        description: &str,
    ) -> AccessResult<Permission> {
        authorize(&self.policy, principal, OperationClass::MutatePermissions)?;
        let entry = NewPermission::new(name, description)?;

        let result = self
            .write(OperationKind::DefineCatalogEntry, self.store.define(entry))
            .await;

        let mut event = AuditEvent::new(
            principal.user_id,
            AuditAction::PermissionDefined,
            outcome_of(&result),
        );
        if let Ok(permission) = &result {
            event = event.with_permission(permission.id);
        }
        self.audit.record(event);
        result
    }

    /// Probe the store with the configured timeout.
    pub async fn store_health(&self) -> StoreHealth {
        let up = match self.bounded(self.store.ping()).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(backend = self.store.backend_name(), error = %err, "store health probe failed");
                false
            }
        };
        StoreHealth { backend: self.store.backend_name(), up }
    }

    async fn try_assign(&self, grant: Grant) -> AccessResult<()> {
        let op = OperationKind::Assign;
        if !self.write(op, self.store.user_exists(grant.user_id)).await? {
            return Err(AccessError::not_found(EntityKind::User));
        }
        if !self.write(op, self.store.exists(grant.permission_id)).await? {
            return Err(AccessError::not_found(EntityKind::Permission));
        }
        if self.write(op, self.store.has(grant)).await? {
            return Err(StoreError::AlreadyGranted.into());
        }
        // The store re-checks all three atomically; a concurrent identical
        // assign lands here as AlreadyGranted.
        self.write(op, self.store.grant(grant)).await
    }

    async fn try_revoke(&self, grant: Grant) -> AccessResult<()> {
        let op = OperationKind::Revoke;
        if !self.write(op, self.store.has(grant)).await? {
            return Err(StoreError::NotGranted.into());
        }
        self.write(op, self.store.revoke(grant)).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))?
    }

    /// Bounded store call on a write path; failures always propagate.
    ///
    /// A timeout that fires while the store is committing leaves the write's
    /// outcome unknown: the caller sees `ServiceUnavailable` and must re-read.
    async fn write<T>(
        &self,
        operation: OperationKind,
        call: impl Future<Output = StoreResult<T>>,
    ) -> AccessResult<T> {
        self.bounded(call).await.map_err(|err| {
            if err.is_connectivity() {
                tracing::warn!(%operation, error = %err, "store unreachable, write rejected");
            }
            AccessError::from(err)
        })
    }

    fn resolve_read(
        &self,
        operation: OperationKind,
        result: StoreResult<Vec<Permission>>,
    ) -> AccessResult<Listing<Permission>> {
        let err = match result {
            Ok(items) => return Ok(Listing::live(items)),
            Err(err) => err,
        };

        match classify(operation, &err) {
            Resolution::Fallback => {
                tracing::warn!(%operation, error = %err, "store unreachable, serving fallback catalog");
                Ok(Listing::degraded(self.fallback.permissions()))
            }
            Resolution::Empty => {
                tracing::warn!(%operation, error = %err, "store unreachable, serving empty listing");
                Ok(Listing::degraded(Vec::new()))
            }
            Resolution::Propagate => Err(err.into()),
        }
    }

    fn audit_grant(
        &self,
        principal: &Principal,
        action: AuditAction,
        grant: Grant,
        result: &AccessResult<()>,
    ) {
        self.audit.record(
            AuditEvent::new(principal.user_id, action, outcome_of(result))
                .with_subject(grant.user_id)
                .with_permission(grant.permission_id),
        );
    }
}

fn outcome_of<T>(result: &AccessResult<T>) -> AuditOutcome {
    match result {
        Ok(_) => AuditOutcome::Success,
        Err(err) => AuditOutcome::Failure(err.code()),
    }
}
