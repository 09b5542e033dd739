//! Visibility scopes and the client reach set.

use std::collections::BTreeSet;

use ledgerbridge_shared::types::{EntityId, UserId};

use crate::access::role::RoleKind;

/// How queries for a caller must be narrowed, on top of the tenant predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityScope {
    /// Every row in the tenant.
    Unrestricted,
    /// Only rows reachable from this client user's memberships.
    Client(UserId),
}

impl VisibilityScope {
    /// Picks the scope for a caller's role.
    #[must_use]
    pub const fn for_role(role: RoleKind, user_id: UserId) -> Self {
        if role.is_restricted() {
            Self::Client(user_id)
        } else {
            Self::Unrestricted
        }
    }

    /// Returns the restricted user, if any.
    #[must_use]
    pub const fn restricted_user(&self) -> Option<UserId> {
        match self {
            Self::Unrestricted => None,
            Self::Client(user_id) => Some(*user_id),
        }
    }
}

/// The two paths by which a client reaches entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientReach {
    /// Entities assigned to client groups the user is an active member of.
    pub via_groups: Vec<EntityId>,
    /// Entities granted to the user directly.
    pub direct: Vec<EntityId>,
}

impl ClientReach {
    /// The visible entity set: the union of both paths.
    #[must_use]
    pub fn visible_entities(&self) -> BTreeSet<EntityId> {
        self.via_groups
            .iter()
            .chain(self.direct.iter())
            .copied()
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_for_role() {
        let user = UserId::new();
        assert_eq!(
            VisibilityScope::for_role(RoleKind::Client, user),
            VisibilityScope::Client(user)
        );
        assert_eq!(
            VisibilityScope::for_role(RoleKind::Staff, user),
            VisibilityScope::Unrestricted
        );
        assert_eq!(
            VisibilityScope::for_role(RoleKind::Unassigned, user).restricted_user(),
            None
        );
    }

    #[test]
    fn test_reach_is_deduplicated_union() {
        let shared = EntityId::new();
        let group_only = EntityId::new();
        let direct_only = EntityId::new();
        let reach = ClientReach {
            via_groups: vec![shared, group_only, shared],
            direct: vec![shared, direct_only],
        };

        let visible = reach.visible_entities();
        assert_eq!(visible.len(), 3);
        assert!(visible.contains(&group_only));
        assert!(visible.contains(&direct_only));
    }

    #[test]
    fn test_empty_reach_sees_nothing() {
        assert!(ClientReach::default().visible_entities().is_empty());
    }
}
