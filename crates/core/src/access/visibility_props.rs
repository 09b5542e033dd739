//! Property-based tests for visibility scopes.

use ledgerbridge_shared::types::UserId;
use proptest::prelude::*;
use uuid::Uuid;

use crate::access::role::RoleKind;
use crate::access::visibility::VisibilityScope;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Only the client role gets a restricted scope, and it is bound to the caller.
    #[test]
    fn prop_only_client_scope_is_restricted(slug in "[a-z]{1,12}", raw in any::<u128>()) {
        let user = UserId::from_uuid(Uuid::from_u128(raw));
        let scope = VisibilityScope::for_role(RoleKind::from_slug(Some(&slug)), user);
        let expected = (slug == "client").then_some(user);
        prop_assert_eq!(scope.restricted_user(), expected);
    }

    /// A missing role never widens beyond staff or narrows to a client.
    #[test]
    fn prop_missing_role_is_never_restricted(raw in any::<u128>()) {
        let user = UserId::from_uuid(Uuid::from_u128(raw));
        let scope = VisibilityScope::for_role(RoleKind::from_slug(None), user);
        prop_assert_eq!(scope.restricted_user(), None);
    }
}
