//! Postgres-backed permission store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database (unique violation) | `23505` | `DuplicateName` / `AlreadyGranted` | Decided by constraint name |
//! | Database (foreign key violation) | `23503` | `NotFound(User)` / `NotFound(Permission)` | Referenced row deleted concurrently |
//! | Database (connection exception) | `08xxx`, `57P01`, `57P03`, `53300` | `Unavailable` | Server going away or refusing connections |
//! | Io / Tls / PoolTimedOut / PoolClosed / WorkerCrashed | N/A | `Unavailable` | Store unreachable |
//! | Other | Any other | `Corrupt` | Unexpected store answer |
//!
//! ## Atomicity
//!
//! `grant` runs its existence checks and insert inside one transaction and
//! relies on the `(user_id, permission_id)` primary key with
//! `ON CONFLICT DO NOTHING`, so concurrent identical grants produce exactly one
//! inserted row. `revoke` is a single `DELETE` whose affected-row count decides
//! the outcome.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::instrument;

use gatekeeper_auth::Role;
use gatekeeper_core::{EntityKind, Grant, NewPermission, Permission, PermissionId, UserId};

use super::{CatalogStore, GrantStore, PermissionStore, StoreError, StoreResult, UserDirectory};

const SCHEMA: &str = include_str!("../../migrations/0001_permissions.sql");

const GRANT_PK: &str = "user_permissions_pkey";
const GRANT_USER_FK: &str = "user_permissions_user_fk";
const GRANT_PERMISSION_FK: &str = "user_permissions_permission_fk";

/// Postgres store over the `users`, `permissions` and `user_permissions` tables.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a lazily connecting pool; no connection is attempted until the
    /// first query, so the service can start while the database is down.
    pub fn connect_lazy(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)
            .map_err(|e| map_sqlx_error("connect_lazy", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

fn permission_from_row(row: &PgRow) -> Result<Permission, sqlx::Error> {
    Ok(Permission {
        id: PermissionId::new(row.try_get("permission_id")?),
        name: row.try_get("permission_name")?,
        description: row.try_get("description")?,
    })
}

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self, permission), fields(name = %permission.name()), err)]
    async fn define(&self, permission: NewPermission) -> StoreResult<Permission> {
        let row = sqlx::query(
            r#"
            INSERT INTO permissions (permission_name, description)
            VALUES ($1, $2)
            RETURNING permission_id, permission_name, description
            "#,
        )
        .bind(permission.name())
        .bind(permission.description())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("define", e))?;

        permission_from_row(&row).map_err(|e| map_sqlx_error("define", e))
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> StoreResult<Vec<Permission>> {
        let rows = sqlx::query(
            r#"
            SELECT permission_id, permission_name, description
            FROM permissions
            ORDER BY permission_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list", e))?;

        rows.iter()
            .map(permission_from_row)
            .collect::<Result<_, _>>()
            .map_err(|e| map_sqlx_error("list", e))
    }

    #[instrument(skip(self), fields(permission_id = %id), err)]
    async fn exists(&self, id: PermissionId) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM permissions WHERE permission_id = $1)",
        )
        .bind(id.get())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("exists", e))
    }
}

#[async_trait]
impl GrantStore for PostgresStore {
    #[instrument(
        skip(self),
        fields(user_id = %grant.user_id, permission_id = %grant.permission_id),
        err
    )]
    async fn grant(&self, grant: Grant) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("grant", e))?;

        let user_found: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
                .bind(grant.user_id.get())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("grant", e))?;
        if !user_found {
            return Err(StoreError::NotFound(EntityKind::User));
        }

        let permission_found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM permissions WHERE permission_id = $1)",
        )
        .bind(grant.permission_id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("grant", e))?;
        if !permission_found {
            return Err(StoreError::NotFound(EntityKind::Permission));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO user_permissions (user_id, permission_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, permission_id) DO NOTHING
            "#,
        )
        .bind(grant.user_id.get())
        .bind(grant.permission_id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("grant", e))?
        .rows_affected();

        if inserted == 0 {
            return Err(StoreError::AlreadyGranted);
        }

        tx.commit().await.map_err(|e| map_sqlx_error("grant", e))
    }

    #[instrument(
        skip(self),
        fields(user_id = %grant.user_id, permission_id = %grant.permission_id),
        err
    )]
    async fn revoke(&self, grant: Grant) -> StoreResult<()> {
        let deleted = sqlx::query(
            "DELETE FROM user_permissions WHERE user_id = $1 AND permission_id = $2",
        )
        .bind(grant.user_id.get())
        .bind(grant.permission_id.get())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("revoke", e))?
        .rows_affected();

        if deleted == 0 {
            return Err(StoreError::NotGranted);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn list_for_user(&self, user_id: UserId) -> StoreResult<Vec<Permission>> {
        let rows = sqlx::query(
            r#"
            SELECT p.permission_id, p.permission_name, p.description
            FROM user_permissions up
            JOIN permissions p ON p.permission_id = up.permission_id
            WHERE up.user_id = $1
            ORDER BY p.permission_id ASC
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_for_user", e))?;

        rows.iter()
            .map(permission_from_row)
            .collect::<Result<_, _>>()
            .map_err(|e| map_sqlx_error("list_for_user", e))
    }

    #[instrument(
        skip(self),
        fields(user_id = %grant.user_id, permission_id = %grant.permission_id),
        err
    )]
    async fn has(&self, grant: Grant) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_permissions
                WHERE user_id = $1 AND permission_id = $2
            )
            "#,
        )
        .bind(grant.user_id.get())
        .bind(grant.permission_id.get())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("has", e))
    }
}

#[async_trait]
impl UserDirectory for PostgresStore {
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
            .bind(user_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_exists", e))
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn role_of(&self, user_id: UserId) -> StoreResult<Option<Role>> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role_name FROM users WHERE user_id = $1")
                .bind(user_id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("role_of", e))?;
        Ok(role.map(Role::new))
    }
}

#[async_trait]
impl PermissionStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            map_database_error(operation, code.as_deref(), db_err.constraint(), db_err.message())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            StoreError::Unavailable(format!("{operation}: {err}"))
        }
        _ => StoreError::Corrupt(format!("sqlx error in {operation}: {err}")),
    }
}

fn map_database_error(
    operation: &str,
    code: Option<&str>,
    constraint: Option<&str>,
    message: &str,
) -> StoreError {
    match code {
        Some("23505") if constraint == Some(GRANT_PK) => StoreError::AlreadyGranted,
        Some("23505") => StoreError::DuplicateName,
        Some("23503") if constraint == Some(GRANT_USER_FK) => StoreError::NotFound(EntityKind::User),
        Some("23503") if constraint == Some(GRANT_PERMISSION_FK) => {
            StoreError::NotFound(EntityKind::Permission)
        }
        Some(c) if c.starts_with("08") || matches!(c, "57P01" | "57P03" | "53300") => {
            StoreError::Unavailable(format!("{operation}: {message}"))
        }
        _ => StoreError::Corrupt(format!("database error in {operation}: {message}")),
    }
}
