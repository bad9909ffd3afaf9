use std::sync::Arc;

use gatekeeper_auth::Role;
use gatekeeper_core::UserId;
use gatekeeper_infra::{
    audit::TracingAuditSink, FallbackCatalog, GatekeeperConfig, InMemoryStore, PermissionService,
    PermissionStore, PostgresStore, StoreError,
};

/// Shared services handed to every handler through an `Extension`.
#[derive(Clone)]
pub struct AppServices {
    pub permissions: PermissionService,
}

impl AppServices {
    pub fn new(permissions: PermissionService) -> Self {
        Self { permissions }
    }
}

/// Demo users available when running without a database.
pub const DEV_USERS: &[(i64, &str)] = &[(1, "admin"), (2, "manager"), (3, "staff")];

/// Wire services over any store using the configured policy and timeout.
pub fn services_for_store(store: Arc<dyn PermissionStore>, config: &GatekeeperConfig) -> AppServices {
    let permissions = PermissionService::new(store, FallbackCatalog::default())
        .with_policy(config.policy.clone())
        .with_timeout(config.store_timeout)
        .with_audit(Arc::new(TracingAuditSink));
    AppServices::new(permissions)
}

/// Postgres when `DATABASE_URL` is set, otherwise a seeded in-memory store.
///
/// The Postgres pool connects lazily; a database that is down at startup
/// leaves the service running in degraded mode.
pub async fn build_services(config: &GatekeeperConfig) -> Result<AppServices, StoreError> {
    let store: Arc<dyn PermissionStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect_lazy(url, config.db_max_connections, config.store_timeout)?;
            if let Err(err) = store.migrate().await {
                tracing::warn!(error = %err, "schema migration skipped; store unreachable or rejected it");
            }
            tracing::info!(backend = "postgres", "permission store configured");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store with demo users");
            let users = DEV_USERS
                .iter()
                .map(|(id, role)| (UserId::new(*id), Role::new(*role)));
            Arc::new(InMemoryStore::seeded(&FallbackCatalog::default(), users))
        }
    };
    Ok(services_for_store(store, config))
}
