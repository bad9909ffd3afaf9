use serde::{Deserialize, Serialize};

use gatekeeper_core::UserId;

use crate::Role;

/// An authenticated caller, as resolved from its bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}
