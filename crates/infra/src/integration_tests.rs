//! Integration tests for the full permission pipeline.
//!
//! Tests: Principal → Gate policy → PermissionService → Store → Degraded-mode policy
//!
//! Verifies:
//! - Grant membership is idempotent and referentially sound
//! - Concurrent identical mutations resolve to exactly one success
//! - Reads degrade to safe defaults, writes never fake success

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gatekeeper_auth::{Principal, Role};
    use gatekeeper_core::{AccessError, ConflictKind, EntityKind, Grant, PermissionId, UserId};

    use crate::fallback::{FallbackCatalog, PermissionSeed};
    use crate::service::PermissionService;
    use crate::store::InMemoryStore;

    static SCENARIO_CATALOG: &[PermissionSeed] = &[
        PermissionSeed { id: 1, name: "view_dashboard", description: "View dashboard" },
        PermissionSeed { id: 2, name: "manage_users", description: "Manage users" },
    ];

    const U: UserId = UserId::new(42);

    fn admin() -> Principal {
        Principal::new(UserId::new(1), Role::ADMIN)
    }

    fn setup() -> (Arc<InMemoryStore>, PermissionService) {
        let store = Arc::new(InMemoryStore::seeded(
            &FallbackCatalog::new(SCENARIO_CATALOG),
            [(UserId::new(1), Role::ADMIN), (U, Role::new("staff"))],
        ));
        let service = PermissionService::new(store.clone(), FallbackCatalog::default());
        (store, service)
    }

    fn ids(items: &[gatekeeper_core::Permission]) -> Vec<i64> {
        items.iter().map(|p| p.id.get()).collect()
    }

    #[tokio::test]
    async fn concrete_assign_list_revoke_scenario() {
        let (_store, service) = setup();
        let admin = admin();

        let granted = service.assign(&admin, U, PermissionId::new(2)).await.unwrap();
        assert_eq!(granted, Grant::new(U, PermissionId::new(2)));

        let listing = service.list_user_permissions(&admin, U).await.unwrap();
        assert!(!listing.is_degraded());
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.items[0].id, PermissionId::new(2));
        assert_eq!(listing.items[0].name, "manage_users");

        let err = service.revoke(&admin, U, PermissionId::new(1)).await.unwrap_err();
        assert_eq!(err, AccessError::NotFound(EntityKind::Grant));

        service.revoke(&admin, U, PermissionId::new(2)).await.unwrap();
        let listing = service.list_user_permissions(&admin, U).await.unwrap();
        assert!(listing.items.is_empty());
    }

    #[tokio::test]
    async fn second_assign_conflicts_and_keeps_one_grant() {
        let (store, service) = setup();
        service.assign(&admin(), U, PermissionId::new(1)).await.unwrap();

        let err = service.assign(&admin(), U, PermissionId::new(1)).await.unwrap_err();
        assert_eq!(err, AccessError::Conflict(ConflictKind::AlreadyGranted));
        assert_eq!(store.grants().unwrap(), vec![Grant::new(U, PermissionId::new(1))]);
    }

    #[tokio::test]
    async fn round_trip_includes_then_excludes() {
        let (_store, service) = setup();
        let admin = admin();

        service.assign(&admin, U, PermissionId::new(1)).await.unwrap();
        service.assign(&admin, U, PermissionId::new(2)).await.unwrap();
        let listing = service.list_user_permissions(&admin, U).await.unwrap();
        assert_eq!(ids(&listing.items), vec![1, 2]);

        service.revoke(&admin, U, PermissionId::new(1)).await.unwrap();
        let listing = service.list_user_permissions(&admin, U).await.unwrap();
        assert_eq!(ids(&listing.items), vec![2]);
    }

    #[tokio::test]
    async fn unknown_user_or_permission_is_not_found_and_creates_nothing() {
        let (store, service) = setup();

        let err = service.assign(&admin(), UserId::new(999), PermissionId::new(1)).await.unwrap_err();
        assert_eq!(err, AccessError::NotFound(EntityKind::User));

        let err = service.assign(&admin(), U, PermissionId::new(999)).await.unwrap_err();
        assert_eq!(err, AccessError::NotFound(EntityKind::Permission));

        assert!(store.grants().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_assign_yields_one_success() {
        for _ in 0..50 {
            let (store, service) = setup();
            let a = {
                let service = service.clone();
                tokio::spawn(async move { service.assign(&admin(), U, PermissionId::new(2)).await })
            };
            let b = {
                let service = service.clone();
                tokio::spawn(async move { service.assign(&admin(), U, PermissionId::new(2)).await })
            };

            let results = [a.await.unwrap(), b.await.unwrap()];
            let ok = results.iter().filter(|r| r.is_ok()).count();
            let conflicts = results
                .iter()
                .filter(|r| **r == Err(AccessError::Conflict(ConflictKind::AlreadyGranted)))
                .count();

            assert_eq!((ok, conflicts), (1, 1));
            assert_eq!(store.grants().unwrap().len(), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_revoke_yields_one_success() {
        for _ in 0..50 {
            let (store, service) = setup();
            service.assign(&admin(), U, PermissionId::new(2)).await.unwrap();

            let a = {
                let service = service.clone();
                tokio::spawn(async move { service.revoke(&admin(), U, PermissionId::new(2)).await })
            };
            let b = {
                let service = service.clone();
                tokio::spawn(async move { service.revoke(&admin(), U, PermissionId::new(2)).await })
            };

            let results = [a.await.unwrap(), b.await.unwrap()];
            let ok = results.iter().filter(|r| r.is_ok()).count();
            let not_granted = results
                .iter()
                .filter(|r| **r == Err(AccessError::NotFound(EntityKind::Grant)))
                .count();

            assert_eq!((ok, not_granted), (1, 1));
            assert!(store.grants().unwrap().is_empty());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_assign_and_revoke_settle_in_a_defined_state() {
        for _ in 0..50 {
            let (store, service) = setup();
            let grant = Grant::new(U, PermissionId::new(1));

            let a = {
                let service = service.clone();
                tokio::spawn(async move { service.assign(&admin(), U, PermissionId::new(1)).await })
            };
            let r = {
                let service = service.clone();
                tokio::spawn(async move { service.revoke(&admin(), U, PermissionId::new(1)).await })
            };
            let assigned = a.await.unwrap();
            let revoked = r.await.unwrap();

            assert!(assigned.is_ok());
            let granted_now = store.grants().unwrap().contains(&grant);
            assert_eq!(granted_now, revoked.is_err());
        }
    }

    #[tokio::test]
    async fn unreachable_store_degrades_reads() {
        let (store, service) = setup();
        service.assign(&admin(), U, PermissionId::new(1)).await.unwrap();
        store.set_available(false);

        let first = service.list_catalog(&admin()).await.unwrap();
        let second = service.list_catalog(&admin()).await.unwrap();
        assert!(first.is_degraded());
        assert!(!first.items.is_empty());
        assert_eq!(first, second);
        assert_eq!(first.items, FallbackCatalog::default().permissions());

        let grants = service.list_user_permissions(&admin(), U).await.unwrap();
        assert!(grants.is_degraded());
        assert!(grants.items.is_empty());
    }

    #[tokio::test]
    async fn unreachable_store_never_fakes_writes() {
        let (store, service) = setup();
        service.assign(&admin(), U, PermissionId::new(1)).await.unwrap();
        store.set_available(false);

        let results = [
            service.assign(&admin(), U, PermissionId::new(2)).await.map(|_| ()),
            service.revoke(&admin(), U, PermissionId::new(1)).await.map(|_| ()),
            service.define_catalog_entry(&admin(), "export_data", "Export").await.map(|_| ()),
        ];
        for result in results {
            assert!(matches!(result, Err(AccessError::ServiceUnavailable(_))), "{result:?}");
        }

        store.set_available(true);
        assert_eq!(store.grants().unwrap(), vec![Grant::new(U, PermissionId::new(1))]);
        assert_eq!(service.list_catalog(&admin()).await.unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn deleting_a_user_removes_their_grants() {
        let (store, service) = setup();
        service.assign(&admin(), U, PermissionId::new(2)).await.unwrap();

        store.remove_user(U).unwrap();
        let listing = service.list_user_permissions(&admin(), U).await.unwrap();
        assert!(listing.items.is_empty());
        let err = service.assign(&admin(), U, PermissionId::new(2)).await.unwrap_err();
        assert_eq!(err, AccessError::NotFound(EntityKind::User));
    }
}
