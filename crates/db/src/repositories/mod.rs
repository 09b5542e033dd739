//! Repository abstractions for data access.
//!
//! Every tenant-scoped method opens its own [`RlsConnection`](crate::rls::RlsConnection)
//! and filters on `tenant_id` explicitly. Read methods that take a
//! [`VisibilityScope`](ledgerbridge_core::access::VisibilityScope) also apply
//! the client narrowing from [`visibility`].

pub mod client_group;
pub mod entity;
pub mod import_run;
pub mod qbo_connection;
pub mod role;
pub mod tenant;
pub mod trial_balance;
pub mod user;
pub mod visibility;

pub use client_group::{
    ClientGroupRepository, CreateClientGroupInput, CreateMembershipInput, UpdateClientGroupInput,
};
pub use entity::{CreateEntityInput, EntityRepository, UpdateEntityInput};
pub use import_run::{CreateImportRunInput, ImportRunFilter, ImportRunRepository};
pub use qbo_connection::{
    CreateConnectionInput, QboConnectionRepository, UpdateConnectionInput, stored_tokens,
};
pub use role::{RoleRepository, RoleSpec};
pub use tenant::{CallerAccess, TenantRepository};
pub use trial_balance::{LineWithAccount, SnapshotWithLines, TrialBalanceRepository};
pub use user::UserRepository;
