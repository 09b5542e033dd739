//! Signed OAuth state tokens.
//!
//! The state parameter survives the round trip through Intuit's consent
//! screen and is the only thing that ties the callback back to a tenant and
//! entity. It is base64url-encoded JSON:
//!
//! ```json
//! {"tenant_id": "...", "entity_id": "...", "redirect_uri": "...",
//!  "ts": 1735689600, "next": "/entities/...", "sig": "<hex hmac>"}
//! ```
//!
//! `sig` is HMAC-SHA256 over `"{tenant_id}|{entity_id}|{ts}"`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use ledgerbridge_shared::types::{EntityId, TenantId};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::qbo::error::StateError;

type HmacSha256 = Hmac<Sha256>;

/// Default validity window in seconds.
pub const DEFAULT_STATE_TTL_SECS: i64 = 600;

/// Verified contents of a state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    /// Tenant that started the flow.
    pub tenant_id: TenantId,
    /// Entity being connected.
    pub entity_id: EntityId,
    /// Redirect URI used for the authorization request.
    pub redirect_uri: String,
    /// Where to send the browser after the callback.
    pub next: Option<String>,
    /// Unix seconds when the token was issued.
    pub issued_at: i64,
}

#[derive(Serialize, Deserialize)]
struct WirePayload {
    tenant_id: Uuid,
    entity_id: Uuid,
    redirect_uri: String,
    ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next: Option<String>,
    sig: String,
}

/// Signs and verifies OAuth state tokens.
#[derive(Clone)]
pub struct StateCodec {
    mac: HmacSha256,
    ttl_secs: i64,
}

impl std::fmt::Debug for StateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCodec")
            .field("mac", &"[hidden]")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl StateCodec {
    /// Creates a codec keyed by the server secret.
    ///
    /// # Errors
    ///
    /// Returns `StateError::EmptySecret` for an empty secret.
    pub fn new(secret: &str, ttl_secs: i64) -> Result<Self, StateError> {
        if secret.is_empty() {
            return Err(StateError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| StateError::EmptySecret)?;
        Ok(Self { mac, ttl_secs })
    }

    /// Issues a token stamped with the current time.
    pub fn encode(
        &self,
        tenant_id: TenantId,
        entity_id: EntityId,
        redirect_uri: &str,
        next: Option<&str>,
    ) -> Result<String, StateError> {
        self.encode_at(tenant_id, entity_id, redirect_uri, next, Utc::now())
    }

    /// Issues a token stamped with `now`.
    pub fn encode_at(
        &self,
        tenant_id: TenantId,
        entity_id: EntityId,
        redirect_uri: &str,
        next: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, StateError> {
        let ts = now.timestamp();
        let payload = WirePayload {
            tenant_id: tenant_id.into_inner(),
            entity_id: entity_id.into_inner(),
            redirect_uri: redirect_uri.to_string(),
            ts,
            next: next.filter(|n| !n.is_empty()).map(str::to_string),
            sig: self.sign(tenant_id.into_inner(), entity_id.into_inner(), ts),
        };

        let json = serde_json::to_vec(&payload).map_err(|e| StateError::Encode(e.to_string()))?;
        Ok(base64_url::encode(&json))
    }

    /// Verifies a token against the current time.
    pub fn decode(&self, token: &str) -> Result<OAuthState, StateError> {
        self.decode_at(token, Utc::now())
    }

    /// Verifies a token against `now`.
    ///
    /// The signature is checked before the age, so a forged token always
    /// reports `Invalid`.
    ///
    /// # Errors
    ///
    /// - `StateError::Invalid` for malformed input or a signature mismatch
    /// - `StateError::Expired` if `|now - ts|` exceeds the TTL
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<OAuthState, StateError> {
        let bytes = base64_url::decode(token.trim().trim_end_matches('='))
            .map_err(|_| StateError::Invalid("malformed state"))?;
        let payload: WirePayload =
            serde_json::from_slice(&bytes).map_err(|_| StateError::Invalid("malformed state"))?;

        let provided =
            hex::decode(&payload.sig).map_err(|_| StateError::Invalid("invalid state signature"))?;
        let mut mac = self.mac.clone();
        mac.update(Self::message(payload.tenant_id, payload.entity_id, payload.ts).as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| StateError::Invalid("invalid state signature"))?;

        // Clock skew between issuing and verifying nodes counts both ways.
        if now.timestamp().abs_diff(payload.ts) > self.ttl_secs.unsigned_abs() {
            return Err(StateError::Expired);
        }

        Ok(OAuthState {
            tenant_id: TenantId::from_uuid(payload.tenant_id),
            entity_id: EntityId::from_uuid(payload.entity_id),
            redirect_uri: payload.redirect_uri,
            next: payload.next,
            issued_at: payload.ts,
        })
    }

    fn sign(&self, tenant_id: Uuid, entity_id: Uuid, ts: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(Self::message(tenant_id, entity_id, ts).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn message(tenant_id: Uuid, entity_id: Uuid, ts: i64) -> String {
        format!("{tenant_id}|{entity_id}|{ts}")
    }
}
