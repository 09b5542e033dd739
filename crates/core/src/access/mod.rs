//! Role-based capabilities and row visibility.
//!
//! Staff roles see every row in the tenant. The reserved `client` role sees
//! only the client groups it belongs to and the entities reachable from
//! those groups or granted to it directly, and it cannot mutate anything.
//!
//! # Modules
//!
//! - `role` - Role classification and the capability policy
//! - `visibility` - Visibility scopes and the client reach set
//! - `error` - Access error types

pub mod error;
pub mod role;
pub mod visibility;

#[cfg(test)]
mod visibility_props;

pub use error::AccessError;
pub use role::{CLIENT_ROLE_SLUG, Capability, RoleKind};
pub use visibility::{ClientReach, VisibilityScope};
