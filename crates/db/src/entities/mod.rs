//! `SeaORM` entity definitions.

pub mod prelude;

pub mod client_group_entities;
pub mod client_group_memberships;
pub mod client_group_tax_years;
pub mod client_groups;
pub mod entities;
pub mod entity_memberships;
pub mod import_runs;
pub mod qbo_connections;
pub mod roles;
pub mod sea_orm_active_enums;
pub mod tenant_memberships;
pub mod tenants;
pub mod trial_balance_accounts;
pub mod trial_balance_lines;
pub mod trial_balance_snapshots;
pub mod users;
