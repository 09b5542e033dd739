//! Initial schema.
//!
//! Creates the tenancy, visibility and import tables. Tenant-scoped tables
//! all carry a non-null `tenant_id`; row-level security is added by the
//! next migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: TENANCY
        // ============================================================
        db.execute_unprepared(TENANTS_SQL).await?;
        db.execute_unprepared(USERS_SQL).await?;
        db.execute_unprepared(ROLES_SQL).await?;
        db.execute_unprepared(TENANT_MEMBERSHIPS_SQL).await?;

        // ============================================================
        // PART 3: ENTITIES & VISIBILITY
        // ============================================================
        db.execute_unprepared(ENTITIES_SQL).await?;
        db.execute_unprepared(CLIENT_GROUPS_SQL).await?;
        db.execute_unprepared(ENTITY_MEMBERSHIPS_SQL).await?;

        // ============================================================
        // PART 4: QUICKBOOKS & IMPORTS
        // ============================================================
        db.execute_unprepared(QBO_CONNECTIONS_SQL).await?;
        db.execute_unprepared(IMPORT_RUNS_SQL).await?;
        db.execute_unprepared(TRIAL_BALANCE_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE import_run_status AS ENUM ('queued', 'running', 'success', 'failed');
";

const TENANTS_SQL: &str = r"
CREATE TABLE tenants (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name                VARCHAR(255) NOT NULL,
    slug                VARCHAR(100) NOT NULL UNIQUE,
    is_active           BOOLEAN NOT NULL DEFAULT true,
    is_suspended        BOOLEAN NOT NULL DEFAULT false,
    suspended_reason    TEXT,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at          TIMESTAMPTZ
);
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    email               VARCHAR(255) NOT NULL UNIQUE,
    full_name           VARCHAR(255),
    is_active           BOOLEAN NOT NULL DEFAULT true,
    is_superuser        BOOLEAN NOT NULL DEFAULT false,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const ROLES_SQL: &str = r"
-- tenant_id NULL = platform-level role
CREATE TABLE roles (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID REFERENCES tenants(id) ON DELETE CASCADE,
    name                VARCHAR(100) NOT NULL,
    slug                VARCHAR(100) NOT NULL UNIQUE,
    description         TEXT,
    is_system_role      BOOLEAN NOT NULL DEFAULT false,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_roles_tenant_name UNIQUE (tenant_id, name)
);
";

const TENANT_MEMBERSHIPS_SQL: &str = r"
CREATE TABLE tenant_memberships (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    user_id             UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role_id             UUID REFERENCES roles(id) ON DELETE SET NULL,
    is_owner            BOOLEAN NOT NULL DEFAULT false,
    is_active           BOOLEAN NOT NULL DEFAULT true,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_tenant_memberships_user UNIQUE (tenant_id, user_id)
);

CREATE INDEX idx_tenant_memberships_user ON tenant_memberships(user_id);
";

const ENTITIES_SQL: &str = r"
CREATE TABLE entities (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name                VARCHAR(255) NOT NULL,
    entity_type         VARCHAR(50) NOT NULL DEFAULT 'Individual',
    status              VARCHAR(50) NOT NULL DEFAULT 'active',
    ein                 VARCHAR(20),
    tax_type            VARCHAR(50),
    source_type         VARCHAR(50) NOT NULL DEFAULT 'MANUAL_PROFORMA',
    notes               TEXT,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_entities_tenant_name UNIQUE (tenant_id, name)
);

CREATE INDEX idx_entities_tenant ON entities(tenant_id);
";

const CLIENT_GROUPS_SQL: &str = r"
CREATE TABLE client_groups (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name                VARCHAR(255) NOT NULL,
    description         TEXT,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_client_groups_tenant_name UNIQUE (tenant_id, name)
);

CREATE TABLE client_group_entities (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    client_group_id     UUID NOT NULL REFERENCES client_groups(id) ON DELETE CASCADE,
    entity_id           UUID NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_client_group_entities UNIQUE (tenant_id, client_group_id, entity_id)
);

CREATE INDEX idx_client_group_entities_group ON client_group_entities(client_group_id);
CREATE INDEX idx_client_group_entities_entity ON client_group_entities(entity_id);

CREATE TABLE client_group_memberships (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    user_id             UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    client_group_id     UUID NOT NULL REFERENCES client_groups(id) ON DELETE CASCADE,
    role_slug           VARCHAR(100) NOT NULL DEFAULT 'client' REFERENCES roles(slug),
    is_active           BOOLEAN NOT NULL DEFAULT true,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_client_group_membership UNIQUE (tenant_id, user_id, client_group_id)
);

-- A user holds at most one active client membership per tenant
CREATE UNIQUE INDEX uq_client_group_memberships_client_user
    ON client_group_memberships(tenant_id, user_id)
    WHERE role_slug = 'client' AND is_active;

CREATE INDEX idx_client_group_memberships_group ON client_group_memberships(client_group_id);
";

const ENTITY_MEMBERSHIPS_SQL: &str = r"
CREATE TABLE entity_memberships (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    user_id             UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    entity_id           UUID NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_entity_memberships_user_entity UNIQUE (tenant_id, user_id, entity_id)
);

CREATE INDEX idx_entity_memberships_entity ON entity_memberships(entity_id);
";

const QBO_CONNECTIONS_SQL: &str = r"
CREATE TABLE qbo_connections (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    entity_id           UUID NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    realm_id            VARCHAR(64) NOT NULL,
    access_token        TEXT,
    refresh_token       TEXT,
    token_expires_at    TIMESTAMPTZ,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_qbo_connections_entity UNIQUE (entity_id),
    CONSTRAINT uq_qbo_connections_tenant_realm UNIQUE (tenant_id, realm_id)
);
";

const IMPORT_RUNS_SQL: &str = r"
CREATE TABLE client_group_tax_years (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    client_group_id     UUID NOT NULL REFERENCES client_groups(id) ON DELETE CASCADE,
    tax_year            INTEGER NOT NULL,
    status              VARCHAR(50) NOT NULL DEFAULT 'draft',
    start_date          DATE,
    end_date            DATE,
    notes               TEXT,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_client_group_tax_year UNIQUE (tenant_id, client_group_id, tax_year)
);

CREATE TABLE import_runs (
    id                          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id                   UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    entity_id                   UUID NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    client_group_id             UUID REFERENCES client_groups(id) ON DELETE CASCADE,
    client_group_tax_year_id    UUID REFERENCES client_group_tax_years(id) ON DELETE SET NULL,
    tax_year                    INTEGER NOT NULL,
    period_end_date             DATE NOT NULL,
    status                      import_run_status NOT NULL DEFAULT 'queued',
    started_at                  TIMESTAMPTZ,
    finished_at                 TIMESTAMPTZ,
    triggered_by_user_id        UUID REFERENCES users(id) ON DELETE SET NULL,
    error_text                  TEXT,
    created_at                  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at                  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_import_runs_entity_year ON import_runs(entity_id, tax_year);
CREATE INDEX idx_import_runs_tenant_status ON import_runs(tenant_id, status);
";

const TRIAL_BALANCE_SQL: &str = r"
CREATE TABLE trial_balance_accounts (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    entity_id           UUID NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    external_account_id VARCHAR(64),
    name                VARCHAR(255) NOT NULL,
    account_type        VARCHAR(50),
    is_active           BOOLEAN NOT NULL DEFAULT true,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_trial_balance_accounts_entity ON trial_balance_accounts(entity_id);

-- Snapshots are append-only: one per import run
CREATE TABLE trial_balance_snapshots (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    entity_id           UUID NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    import_run_id       UUID NOT NULL REFERENCES import_runs(id) ON DELETE CASCADE,
    tax_year            INTEGER NOT NULL,
    period_end_date     DATE NOT NULL,
    snapshot_type       VARCHAR(30) NOT NULL DEFAULT 'MONTH_ACTIVITY',
    source              VARCHAR(30) NOT NULL DEFAULT 'QBO_IMPORTED',
    run_type            VARCHAR(30) NOT NULL DEFAULT 'IMPORT',
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_trial_balance_snapshot UNIQUE
        (entity_id, tax_year, period_end_date, snapshot_type, run_type, import_run_id)
);

CREATE INDEX idx_trial_balance_snapshots_entity_year_period
    ON trial_balance_snapshots(entity_id, tax_year, period_end_date);

CREATE TABLE trial_balance_lines (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id           UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    snapshot_id         UUID NOT NULL REFERENCES trial_balance_snapshots(id) ON DELETE CASCADE,
    account_id          UUID NOT NULL REFERENCES trial_balance_accounts(id) ON DELETE CASCADE,
    amount              NUMERIC(18, 2) NOT NULL,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_trial_balance_lines_snapshot ON trial_balance_lines(snapshot_id);
CREATE INDEX idx_trial_balance_lines_account ON trial_balance_lines(account_id);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS trial_balance_lines CASCADE;
DROP TABLE IF EXISTS trial_balance_snapshots CASCADE;
DROP TABLE IF EXISTS trial_balance_accounts CASCADE;
DROP TABLE IF EXISTS import_runs CASCADE;
DROP TABLE IF EXISTS client_group_tax_years CASCADE;
DROP TABLE IF EXISTS qbo_connections CASCADE;
DROP TABLE IF EXISTS entity_memberships CASCADE;
DROP TABLE IF EXISTS client_group_memberships CASCADE;
DROP TABLE IF EXISTS client_group_entities CASCADE;
DROP TABLE IF EXISTS client_groups CASCADE;
DROP TABLE IF EXISTS entities CASCADE;
DROP TABLE IF EXISTS tenant_memberships CASCADE;
DROP TABLE IF EXISTS roles CASCADE;
DROP TABLE IF EXISTS users CASCADE;
DROP TABLE IF EXISTS tenants CASCADE;
DROP TYPE IF EXISTS import_run_status;
";
