//! Request-scoped tenant context.

use ledgerbridge_shared::types::TenantId;
use serde::Serialize;
use uuid::Uuid;

use crate::tenant::error::TenantError;

/// The tenant a request acts on.
///
/// Created once per request from the tenant header and passed down
/// explicitly. It is never stored in process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    /// Creates a context for a known tenant.
    #[must_use]
    pub const fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    /// Returns the tenant id.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the tenant id as a raw UUID for persistence layers.
    #[must_use]
    pub const fn tenant_uuid(&self) -> Uuid {
        self.tenant_id.0
    }
}

/// Whether a route insists on a tenant header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantRequirement {
    /// Missing header is an error.
    Required,
    /// Missing header yields no context.
    Optional,
}

/// Resolves the tenant context from a raw header value.
///
/// Blank values count as absent. A present value must parse as a UUID
/// regardless of the requirement.
///
/// # Errors
///
/// - `TenantError::InvalidFormat` if the value is not a UUID
/// - `TenantError::Missing` if the header is absent and required
pub fn resolve(
    header: Option<&str>,
    requirement: TenantRequirement,
) -> Result<Option<TenantContext>, TenantError> {
    let raw = header.map(str::trim).filter(|value| !value.is_empty());

    match raw {
        Some(value) => Uuid::parse_str(value)
            .map(|uuid| Some(TenantContext::new(TenantId::from_uuid(uuid))))
            .map_err(|_| TenantError::InvalidFormat(value.to_string())),
        None => match requirement {
            TenantRequirement::Required => Err(TenantError::Missing),
            TenantRequirement::Optional => Ok(None),
        },
    }
}
