//! The authenticated caller inside a tenant.

use axum::{extract::FromRequestParts, http::request::Parts};
use ledgerbridge_core::access::{Capability, RoleKind, VisibilityScope};
use ledgerbridge_core::tenant::{TenantContext, check_access};
use ledgerbridge_db::TenantRepository;
use ledgerbridge_shared::AppError;
use ledgerbridge_shared::auth::Claims;
use ledgerbridge_shared::types::{TenantId, UserId};
use tracing::debug;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// A user acting inside the request's tenant.
///
/// Extraction requires the auth and tenant middleware to have run. It loads
/// the tenant and membership, rejects inaccessible tenants and non-members,
/// and classifies the membership role.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    /// Resolved tenant.
    pub tenant: TenantContext,
    /// Authenticated user.
    pub user_id: UserId,
    /// Role classification.
    pub role: RoleKind,
    /// Row visibility for read queries.
    pub scope: VisibilityScope,
}

impl Caller {
    /// Returns the tenant id.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant.tenant_id()
    }

    /// Fails with `ACCESS_DENIED` unless the role holds the capability.
    pub fn require(&self, capability: Capability) -> ApiResult<()> {
        self.role.require(capability).map_err(|e| {
            debug!(
                tenant_id = %self.tenant_id(),
                user_id = %self.user_id,
                ?capability,
                "Capability denied"
            );
            ApiError::from(e)
        })
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .extensions
            .get::<TenantContext>()
            .copied()
            .ok_or(ApiError(AppError::TenantRequired))?;
        let user_id = parts
            .extensions
            .get::<Claims>()
            .map(|claims| UserId::from_uuid(claims.user_id()))
            .ok_or_else(|| ApiError(AppError::Unauthorized("Authentication required".into())))?;

        let access = TenantRepository::new(state.db.clone())
            .caller_access(tenant.tenant_id(), user_id)
            .await?;
        check_access(access.tenant, access.membership)?;

        let role = RoleKind::from_slug(access.role_slug.as_deref());
        Ok(Self {
            tenant,
            user_id,
            role,
            scope: VisibilityScope::for_role(role, user_id),
        })
    }
}
