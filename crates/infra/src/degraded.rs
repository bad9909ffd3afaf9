//! Degraded-mode policy: what a store failure turns into, per operation.

use crate::store::StoreError;

/// Operation the permission service was performing when the store failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ListCatalog,
    ListUserPermissions,
    Assign,
    Revoke,
    DefineCatalogEntry,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::ListCatalog,
        OperationKind::ListUserPermissions,
        OperationKind::Assign,
        OperationKind::Revoke,
        OperationKind::DefineCatalogEntry,
    ];

    pub fn is_read(self) -> bool {
        matches!(self, OperationKind::ListCatalog | OperationKind::ListUserPermissions)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::ListCatalog => "list_catalog",
            OperationKind::ListUserPermissions => "list_user_permissions",
            OperationKind::Assign => "assign",
            OperationKind::Revoke => "revoke",
            OperationKind::DefineCatalogEntry => "define_catalog_entry",
        }
    }
}

impl core::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response strategy for a failed store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Serve the built-in reference catalog.
    Fallback,
    /// Serve an empty listing.
    Empty,
    /// Surface the error to the caller.
    Propagate,
}

/// Pure decision: connectivity failures on reads degrade, everything else propagates.
pub fn classify(operation: OperationKind, error: &StoreError) -> Resolution {
    if !error.is_connectivity() {
        return Resolution::Propagate;
    }
    match operation {
        OperationKind::ListCatalog => Resolution::Fallback,
        OperationKind::ListUserPermissions => Resolution::Empty,
        OperationKind::Assign | OperationKind::Revoke | OperationKind::DefineCatalogEntry => {
            Resolution::Propagate
        }
    }
}
