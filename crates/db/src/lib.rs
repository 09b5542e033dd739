//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Migrations for the schema and the tenant isolation policies
//! - [`RlsConnection`], the tenant-bound transaction every repository uses
//! - Repositories with visibility scoping
//! - [`SeaImportStore`], the persistence port of the import orchestrator

pub mod entities;
pub mod error;
pub mod migration;
pub mod repositories;
pub mod rls;
pub mod store;

pub use error::RepoError;
pub use repositories::{
    ClientGroupRepository, EntityRepository, ImportRunRepository, QboConnectionRepository,
    RoleRepository, TenantRepository, TrialBalanceRepository, UserRepository,
};
pub use rls::{RlsConnection, RlsExt};
pub use store::SeaImportStore;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

/// Establishes a connection pool.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    min_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(max_connections)
        .min_connections(min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
