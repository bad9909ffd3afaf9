//! Strongly-typed identifiers used across the permission domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::AccessError;

/// Identifier of a user (owned by the user-management collaborator).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Identifier of a permission definition in the catalog.
///
/// Allocated by the store on definition; stable for the lifetime of the entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(i64);

macro_rules! impl_int_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        /// Parses a path/query segment. Only positive integers are valid ids.
        impl FromStr for $t {
            type Err = AccessError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| AccessError::validation(format!("{}: {}", $name, e)))?;
                if value <= 0 {
                    return Err(AccessError::validation(format!(
                        "{}: must be a positive integer",
                        $name
                    )));
                }
                Ok(Self(value))
            }
        }
    };
}

impl_int_newtype!(UserId, "UserId");
impl_int_newtype!(PermissionId, "PermissionId");
