//! Catalog entries and the user↔permission relation.

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, AccessResult};
use crate::id::{PermissionId, UserId};

/// Longest accepted permission name (after trimming).
pub const MAX_NAME_LEN: usize = 64;

/// Longest accepted permission description.
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// A catalog entry.
///
/// Serialized with the field names the admin console consumes
/// (`permission_id`, `permission_name`, `description`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(rename = "permission_id")]
    pub id: PermissionId,
    #[serde(rename = "permission_name")]
    pub name: String,
    pub description: String,
}

/// A validated request to define a new catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    name: String,
    description: String,
}

impl NewPermission {
    /// Validate and normalize a definition request.
    ///
    /// Names are trimmed and must be 1..=64 characters from `[A-Za-z0-9_.:-]`.
    /// Uniqueness is checked by the store, case-sensitively.
    pub fn new(name: impl AsRef<str>, description: impl AsRef<str>) -> AccessResult<Self> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(AccessError::validation("permission name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AccessError::validation(format!(
                "permission name exceeds {MAX_NAME_LEN} characters"
            )));
        }
        if let Some(bad) = name.chars().find(|c| !is_name_char(*c)) {
            return Err(AccessError::validation(format!(
                "permission name contains invalid character {bad:?}"
            )));
        }

        let description = description.as_ref().trim();
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AccessError::validation(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Materialize the entry once the store has allocated its id.
    pub fn with_id(self, id: PermissionId) -> Permission {
        Permission {
            id,
            name: self.name,
            description: self.description,
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

/// The fact "user has been explicitly granted this permission".
///
/// Carries no payload beyond the pair; its existence is the grant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Grant {
    pub user_id: UserId,
    pub permission_id: PermissionId,
}

impl Grant {
    pub fn new(user_id: UserId, permission_id: PermissionId) -> Self {
        Self {
            user_id,
            permission_id,
        }
    }
}
