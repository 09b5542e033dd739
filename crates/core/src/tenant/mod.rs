//! Tenant context resolution.
//!
//! Every tenant-scoped request carries the tenant id in a header. This
//! module turns that raw header value into a validated [`TenantContext`]
//! and decides whether a user may act inside the tenant.
//!
//! # Modules
//!
//! - `context` - Header parsing and the request-scoped context value
//! - `access` - Tenant standing and membership checks
//! - `error` - Tenant-specific error types

pub mod access;
pub mod context;
pub mod error;

pub use access::{MembershipStanding, TenantStanding, check_access};
pub use context::{TenantContext, TenantRequirement, resolve};
pub use error::TenantError;
