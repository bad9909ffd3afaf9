use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use gatekeeper_core::AccessError;

use crate::{Principal, Role, TokenError, TokenVerifier};

/// Class of operation a request wants to perform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    /// Catalog browsing.
    ReadPermissions,
    /// Listing the grants of a specific user.
    ReadUserPermissions,
    /// Assign, revoke, and catalog definition.
    MutatePermissions,
}

impl core::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            OperationClass::ReadPermissions => "read permissions",
            OperationClass::ReadUserPermissions => "read user permissions",
            OperationClass::MutatePermissions => "mutate permissions",
        })
    }
}

/// Role requirements per operation class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePolicy {
    pub admin_role: Role,
    /// When false, any authenticated caller may browse the catalog.
    pub catalog_requires_admin: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            admin_role: Role::ADMIN,
            catalog_requires_admin: true,
        }
    }
}

impl GatePolicy {
    pub fn requires_admin(&self, operation: OperationClass) -> bool {
        match operation {
            OperationClass::ReadPermissions => self.catalog_requires_admin,
            OperationClass::ReadUserPermissions | OperationClass::MutatePermissions => true,
        }
    }

    pub fn is_admin(&self, principal: &Principal) -> bool {
        principal.role == self.admin_role
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: role '{role}' may not {operation}")]
    Forbidden { operation: OperationClass, role: Role },
}

impl From<TokenError> for AuthzError {
    fn from(value: TokenError) -> Self {
        AuthzError::Unauthenticated(value.to_string())
    }
}

impl From<AuthzError> for AccessError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Unauthenticated(reason) => AccessError::Unauthenticated(reason),
            forbidden @ AuthzError::Forbidden { .. } => AccessError::Forbidden(forbidden.to_string()),
        }
    }
}

/// Authorize an authenticated principal for an operation class.
///
/// - No IO
/// - No panics
/// - Pure policy check
pub fn authorize(
    policy: &GatePolicy,
    principal: &Principal,
    operation: OperationClass,
) -> Result<(), AuthzError> {
    if policy.requires_admin(operation) && !policy.is_admin(principal) {
        tracing::debug!(
            user_id = %principal.user_id,
            role = %principal.role,
            %operation,
            "authorization denied"
        );
        return Err(AuthzError::Forbidden {
            operation,
            role: principal.role.clone(),
        });
    }
    Ok(())
}

/// Authentication half of the gate: bearer credential to principal.
///
/// Role checks run per operation through [`authorize`] against the policy the
/// permission service holds. Denials are never retried.
#[derive(Clone)]
pub struct Gate {
    verifier: Arc<dyn TokenVerifier>,
}

impl Gate {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Resolve a bearer credential to a principal.
    pub fn authenticate(
        &self,
        credential: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Principal, AuthzError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthzError::Unauthenticated("missing bearer credential".to_string()))?;

        let claims = self.verifier.verify(token, now)?;
        Ok(Principal::new(claims.sub, claims.role))
    }
}
