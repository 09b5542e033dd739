//! Row-level security for tenant-scoped tables.
//!
//! Every policy compares the row's `tenant_id` with the transaction-local
//! `app.current_tenant_id` setting. FORCE applies the policies to the table
//! owner as well.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Tables carrying a non-null `tenant_id`.
pub const TENANT_TABLES: &[&str] = &[
    "tenant_memberships",
    "entities",
    "client_groups",
    "client_group_entities",
    "client_group_memberships",
    "entity_memberships",
    "qbo_connections",
    "client_group_tax_years",
    "import_runs",
    "trial_balance_accounts",
    "trial_balance_snapshots",
    "trial_balance_lines",
];

fn enable_sql(table: &str) -> String {
    format!(
        "ALTER TABLE {table} ENABLE ROW LEVEL SECURITY;
ALTER TABLE {table} FORCE ROW LEVEL SECURITY;
CREATE POLICY tenant_isolation ON {table}
    USING (tenant_id::text = current_setting('app.current_tenant_id', true))
    WITH CHECK (tenant_id::text = current_setting('app.current_tenant_id', true));"
    )
}

fn disable_sql(table: &str) -> String {
    format!(
        "DROP POLICY IF EXISTS tenant_isolation ON {table};
ALTER TABLE {table} NO FORCE ROW LEVEL SECURITY;
ALTER TABLE {table} DISABLE ROW LEVEL SECURITY;"
    )
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for table in TENANT_TABLES {
            db.execute_unprepared(&enable_sql(table)).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for table in TENANT_TABLES {
            db.execute_unprepared(&disable_sql(table)).await?;
        }
        Ok(())
    }
}
