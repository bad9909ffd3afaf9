//! Built-in reference catalog served while the store is unreachable.

use gatekeeper_core::{Permission, PermissionId};

/// One row of a constant permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionSeed {
    pub id: i64,
    pub name: &'static str,
    pub description: &'static str,
}

/// Reference permission set shipped with the service.
pub const REFERENCE_PERMISSIONS: &[PermissionSeed] = &[
    PermissionSeed { id: 1, name: "view_dashboard", description: "View dashboard" },
    PermissionSeed { id: 2, name: "view_sales", description: "View sales data" },
    PermissionSeed { id: 3, name: "manage_users", description: "Manage users" },
    PermissionSeed { id: 4, name: "manage_products", description: "Manage products" },
    PermissionSeed { id: 5, name: "manage_inventory", description: "Manage inventory" },
    PermissionSeed { id: 6, name: "view_reports", description: "View reports" },
];

/// Immutable fallback table injected into the permission service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackCatalog {
    entries: &'static [PermissionSeed],
}

impl FallbackCatalog {
    pub const fn new(entries: &'static [PermissionSeed]) -> Self {
        Self { entries }
    }

    /// Materialized entries, sorted by id ascending.
    pub fn permissions(&self) -> Vec<Permission> {
        let mut out: Vec<Permission> = self
            .entries
            .iter()
            .map(|s| Permission {
                id: PermissionId::new(s.id),
                name: s.name.to_string(),
                description: s.description.to_string(),
            })
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }
}

impl Default for FallbackCatalog {
    fn default() -> Self {
        Self::new(REFERENCE_PERMISSIONS)
    }
}
