//! Role classification and capability policy.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::access::error::AccessError;

/// Slug of the reserved restricted role.
pub const CLIENT_ROLE_SLUG: &str = "client";

/// How a tenant role slug behaves for visibility and writes.
///
/// Only the reserved `client` slug is special. Any other slug, and a
/// membership without a role, is treated as tenant staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    /// External client user with restricted visibility and no writes.
    Client,
    /// Tenant staff with a named role.
    Staff,
    /// Membership without a role.
    Unassigned,
}

impl RoleKind {
    /// Classifies a role slug.
    #[must_use]
    pub fn from_slug(slug: Option<&str>) -> Self {
        match slug {
            Some(CLIENT_ROLE_SLUG) => Self::Client,
            Some(_) => Self::Staff,
            None => Self::Unassigned,
        }
    }

    /// Returns true if row visibility must be narrowed for this role.
    #[must_use]
    pub const fn is_restricted(self) -> bool {
        matches!(self, Self::Client)
    }

    /// Returns true if the role holds the capability.
    #[must_use]
    pub const fn allows(self, capability: Capability) -> bool {
        match self {
            Self::Client => matches!(capability, Capability::ReadTenantData),
            Self::Staff | Self::Unassigned => true,
        }
    }

    /// Checks the capability.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Denied` if the role lacks the capability.
    pub fn require(self, capability: Capability) -> Result<(), AccessError> {
        if self.allows(capability) {
            Ok(())
        } else {
            Err(AccessError::Denied(capability))
        }
    }
}

/// Operations guarded by the role policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Read rows within the caller's visibility.
    ReadTenantData,
    /// Create, update or delete entities.
    ManageEntities,
    /// Create, update or delete client groups and their assignments.
    ManageClientGroups,
    /// Link, update or unlink QuickBooks connections.
    ManageConnections,
    /// Trigger import runs.
    ManageImports,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ReadTenantData => "read tenant data",
            Self::ManageEntities => "manage entities",
            Self::ManageClientGroups => "manage client groups",
            Self::ManageConnections => "manage QuickBooks connections",
            Self::ManageImports => "trigger imports",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("client"), RoleKind::Client)]
    #[case(Some("admin"), RoleKind::Staff)]
    #[case(Some("Client"), RoleKind::Staff)]
    #[case(None, RoleKind::Unassigned)]
    fn test_from_slug(#[case] slug: Option<&str>, #[case] expected: RoleKind) {
        assert_eq!(RoleKind::from_slug(slug), expected);
    }

    #[test]
    fn test_only_client_is_restricted() {
        assert!(RoleKind::Client.is_restricted());
        assert!(!RoleKind::Staff.is_restricted());
        assert!(!RoleKind::Unassigned.is_restricted());
    }

    #[rstest]
    #[case(Capability::ManageEntities)]
    #[case(Capability::ManageClientGroups)]
    #[case(Capability::ManageConnections)]
    #[case(Capability::ManageImports)]
    fn test_client_cannot_write(#[case] capability: Capability) {
        assert_eq!(
            RoleKind::Client.require(capability),
            Err(AccessError::Denied(capability))
        );
        assert!(RoleKind::Staff.require(capability).is_ok());
        assert!(RoleKind::Unassigned.require(capability).is_ok());
    }

    #[test]
    fn test_client_can_read() {
        assert!(RoleKind::Client.require(Capability::ReadTenantData).is_ok());
    }
}
