//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration.

pub use sea_orm_migration::prelude::*;

mod m20250201_000001_schema;
mod m20250201_000002_tenant_rls;

pub use m20250201_000002_tenant_rls::TENANT_TABLES;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250201_000001_schema::Migration),
            Box::new(m20250201_000002_tenant_rls::Migration),
        ]
    }
}
