//! Token grants and stored token sets.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Body of a successful token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenGrant {
    /// New access token.
    pub access_token: String,
    /// New refresh token. Intuit may omit it on refresh.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Refresh token lifetime in seconds.
    #[serde(default)]
    pub x_refresh_token_expires_in: Option<i64>,
    /// Usually `bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Tokens as stored on a connection.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Token used to obtain a new access token.
    pub refresh_token: Option<String>,
    /// Absolute expiry of the access token.
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[hidden]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[hidden]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TokenSet {
    /// Builds the token set from an authorization-code grant.
    #[must_use]
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            expires_at: expiry(grant.expires_in, now),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
        }
    }

    /// Applies a refresh grant.
    ///
    /// Fields the grant omits keep their previous values.
    #[must_use]
    pub fn refreshed(&self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            expires_at: expiry(grant.expires_in, now).or(self.expires_at),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or_else(|| self.refresh_token.clone()),
        }
    }

    /// Returns true if the access token expires within `skew` of `now`.
    ///
    /// A token without a recorded expiry is never refreshed proactively.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expires_at.is_some_and(|at| {
            now.checked_add_signed(skew)
                .is_none_or(|threshold| at <= threshold)
        })
    }
}

/// Absolute expiry for a provider lifetime.
///
/// A lifetime too large to represent is recorded as already expired, so the
/// next import refreshes instead of trusting it.
fn expiry(expires_in: Option<i64>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    expires_in.filter(|secs| *secs > 0).map(|secs| {
        Duration::try_seconds(secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(now)
    })
}
