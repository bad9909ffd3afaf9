//! Infrastructure layer: stores, degraded-mode policy, audit, config, and the
//! permission service that ties them together.

pub mod audit;
pub mod config;
pub mod degraded;
pub mod fallback;
pub mod service;
pub mod store;

mod integration_tests;

pub use config::{ConfigError, GatekeeperConfig};
pub use fallback::FallbackCatalog;
pub use service::{Listing, PermissionService, ReadMode, StoreHealth};
pub use store::{InMemoryStore, PermissionStore, PostgresStore, StoreError};
