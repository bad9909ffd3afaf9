use serde::{Deserialize, Serialize};

use gatekeeper_core::{AccessError, AccessResult, Permission, PermissionId};
use gatekeeper_infra::Listing;

/// An id sent either as a JSON number or as a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdInput {
    Number(i64),
    Text(String),
}

impl IdInput {
    pub fn into_permission_id(self) -> AccessResult<PermissionId> {
        match self {
            IdInput::Number(n) if n > 0 => Ok(PermissionId::new(n)),
            IdInput::Number(_) => Err(AccessError::validation(
                "permission_id: must be a positive integer",
            )),
            IdInput::Text(s) => s.parse(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignPermissionRequest {
    #[serde(alias = "permissionId")]
    pub permission_id: IdInput,
}

#[derive(Debug, Deserialize)]
pub struct DefinePermissionRequest {
    #[serde(alias = "name")]
    pub permission_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct PermissionListResponse {
    pub permissions: Vec<Permission>,
    /// Set when the store was unreachable and a safe default was served.
    pub degraded: bool,
}

impl From<Listing<Permission>> for PermissionListResponse {
    fn from(listing: Listing<Permission>) -> Self {
        let degraded = listing.is_degraded();
        Self { permissions: listing.items, degraded }
    }
}
