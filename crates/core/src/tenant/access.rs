//! Tenant standing and membership checks.

use crate::tenant::error::TenantError;

/// Lifecycle flags of a tenant row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantStanding {
    /// Tenant is enabled.
    pub is_active: bool,
    /// Tenant is suspended (e.g. billing).
    pub is_suspended: bool,
    /// Tenant has been soft-deleted.
    pub is_deleted: bool,
}

impl TenantStanding {
    /// A tenant can be accessed iff active, not suspended and not deleted.
    #[must_use]
    pub const fn can_be_accessed(&self) -> bool {
        self.is_active && !self.is_suspended && !self.is_deleted
    }
}

/// A user's membership row in a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipStanding {
    /// Membership is enabled.
    pub is_active: bool,
}

/// Decides whether a user may act inside a tenant.
///
/// # Errors
///
/// - `TenantError::Inaccessible` if the tenant is missing or not accessible
/// - `TenantError::NotMember` if the user has no active membership
pub fn check_access(
    tenant: Option<TenantStanding>,
    membership: Option<MembershipStanding>,
) -> Result<(), TenantError> {
    match tenant {
        Some(standing) if standing.can_be_accessed() => {}
        _ => return Err(TenantError::Inaccessible),
    }

    match membership {
        Some(m) if m.is_active => Ok(()),
        _ => Err(TenantError::NotMember),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEALTHY: TenantStanding = TenantStanding {
        is_active: true,
        is_suspended: false,
        is_deleted: false,
    };
    const MEMBER: MembershipStanding = MembershipStanding { is_active: true };

    #[test]
    fn test_active_member_of_healthy_tenant() {
        assert_eq!(check_access(Some(HEALTHY), Some(MEMBER)), Ok(()));
    }

    #[test]
    fn test_suspended_tenant_is_inaccessible() {
        let suspended = TenantStanding {
            is_suspended: true,
            ..HEALTHY
        };
        assert_eq!(
            check_access(Some(suspended), Some(MEMBER)),
            Err(TenantError::Inaccessible)
        );
    }

    #[test]
    fn test_deleted_or_inactive_tenant_is_inaccessible() {
        let deleted = TenantStanding {
            is_deleted: true,
            ..HEALTHY
        };
        let inactive = TenantStanding {
            is_active: false,
            ..HEALTHY
        };
        assert!(!deleted.can_be_accessed());
        assert!(!inactive.can_be_accessed());
        assert_eq!(check_access(None, Some(MEMBER)), Err(TenantError::Inaccessible));
    }

    #[test]
    fn test_inactive_or_missing_membership() {
        assert_eq!(
            check_access(Some(HEALTHY), Some(MembershipStanding { is_active: false })),
            Err(TenantError::NotMember)
        );
        assert_eq!(check_access(Some(HEALTHY), None), Err(TenantError::NotMember));
    }
}
