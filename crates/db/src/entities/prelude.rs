//! Entity re-exports.

pub use super::client_group_entities::Entity as ClientGroupEntities;
pub use super::client_group_memberships::Entity as ClientGroupMemberships;
pub use super::client_group_tax_years::Entity as ClientGroupTaxYears;
pub use super::client_groups::Entity as ClientGroups;
pub use super::entities::Entity as Entities;
pub use super::entity_memberships::Entity as EntityMemberships;
pub use super::import_runs::Entity as ImportRuns;
pub use super::qbo_connections::Entity as QboConnections;
pub use super::roles::Entity as Roles;
pub use super::tenant_memberships::Entity as TenantMemberships;
pub use super::tenants::Entity as Tenants;
pub use super::trial_balance_accounts::Entity as TrialBalanceAccounts;
pub use super::trial_balance_lines::Entity as TrialBalanceLines;
pub use super::trial_balance_snapshots::Entity as TrialBalanceSnapshots;
pub use super::users::Entity as Users;
