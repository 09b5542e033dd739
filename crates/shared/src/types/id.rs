//! Typed IDs for type-safe references to tenant-scoped records.
//!
//! Using typed IDs prevents accidentally passing an `EntityId` where a
//! `TenantId` is expected, which matters most in the isolation paths.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(TenantId, "Unique identifier for a tenant.");
typed_id!(UserId, "Unique identifier for a user.");
typed_id!(RoleId, "Unique identifier for a role.");
typed_id!(EntityId, "Unique identifier for a business entity.");
typed_id!(ClientGroupId, "Unique identifier for a client group.");
typed_id!(
    ClientGroupTaxYearId,
    "Unique identifier for a client group's tax-year context."
);
typed_id!(QboConnectionId, "Unique identifier for a QuickBooks connection.");
typed_id!(ImportRunId, "Unique identifier for an import run.");
typed_id!(SnapshotId, "Unique identifier for a trial balance snapshot.");
typed_id!(
    TrialBalanceAccountId,
    "Unique identifier for a cached provider account."
);
