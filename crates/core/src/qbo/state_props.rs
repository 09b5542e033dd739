//! Property-based tests for the OAuth state codec.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ledgerbridge_shared::types::{EntityId, TenantId};
use proptest::prelude::*;
use uuid::Uuid;

use crate::qbo::error::StateError;
use crate::qbo::state::StateCodec;

fn codec() -> StateCodec {
    StateCodec::new("prop-secret", 600).unwrap()
}

fn arb_tenant() -> impl Strategy<Value = TenantId> {
    any::<u128>().prop_map(|n| TenantId::from_uuid(Uuid::from_u128(n)))
}

fn arb_entity() -> impl Strategy<Value = EntityId> {
    any::<u128>().prop_map(|n| EntityId::from_uuid(Uuid::from_u128(n)))
}

fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (1_600_000_000i64..2_000_000_000).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn arb_redirect() -> impl Strategy<Value = String> {
    "https://[a-z]{3,12}\\.example/[a-z/]{0,20}"
}

fn arb_next() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), "/[a-z0-9/-]{1,30}".prop_map(Some)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// decode(encode(t, e, r, n)) returns the original payload.
    #[test]
    fn prop_round_trip(
        tenant in arb_tenant(),
        entity in arb_entity(),
        redirect in arb_redirect(),
        next in arb_next(),
        now in arb_instant(),
    ) {
        let codec = codec();
        let token = codec.encode_at(tenant, entity, &redirect, next.as_deref(), now).unwrap();
        let state = codec.decode_at(&token, now).unwrap();

        prop_assert_eq!(state.tenant_id, tenant);
        prop_assert_eq!(state.entity_id, entity);
        prop_assert_eq!(state.redirect_uri, redirect);
        prop_assert_eq!(state.next, next);
        prop_assert_eq!(state.issued_at, now.timestamp());
    }

    /// Changing any byte of the token never yields a different signed identity.
    #[test]
    fn prop_tampering_never_forges_identity(
        tenant in arb_tenant(),
        entity in arb_entity(),
        now in arb_instant(),
        position in any::<prop::sample::Index>(),
        replacement in prop::sample::select(
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_".to_vec()
        ),
    ) {
        let codec = codec();
        let token = codec.encode_at(tenant, entity, "https://app.example/cb", None, now).unwrap();
        let mut bytes = token.into_bytes();
        let index = position.index(bytes.len());
        prop_assume!(bytes[index] != replacement);
        bytes[index] = replacement;
        let tampered = String::from_utf8(bytes).unwrap();

        match codec.decode_at(&tampered, now) {
            Err(err) => prop_assert!(matches!(err, StateError::Invalid(_))),
            Ok(state) => {
                prop_assert_eq!(state.tenant_id, tenant);
                prop_assert_eq!(state.entity_id, entity);
                prop_assert_eq!(state.issued_at, now.timestamp());
            }
        }
    }

    /// Rewriting a signed field in the payload is always detected.
    #[test]
    fn prop_rewritten_signed_field_is_invalid(
        tenant in arb_tenant(),
        entity in arb_entity(),
        now in arb_instant(),
        field in prop::sample::select(vec!["tenant_id", "entity_id", "ts"]),
        other in arb_tenant(),
    ) {
        let codec = codec();
        let token = codec.encode_at(tenant, entity, "https://app.example/cb", None, now).unwrap();
        let mut payload: serde_json::Value =
            serde_json::from_slice(&base64_url::decode(&token).unwrap()).unwrap();
        let replacement = if field == "ts" {
            serde_json::json!(now.timestamp() + 1)
        } else {
            serde_json::json!(other.to_string())
        };
        prop_assume!(payload[field] != replacement);
        payload[field] = replacement;
        let forged = base64_url::encode(&serde_json::to_vec(&payload).unwrap());

        prop_assert!(matches!(codec.decode_at(&forged, now), Err(StateError::Invalid(_))));
    }

    /// Any age beyond the window is expired; anything within is accepted.
    #[test]
    fn prop_ttl_window(now in arb_instant(), age in 0i64..5_000) {
        let codec = codec();
        let token = codec.encode_at(TenantId::new(), EntityId::new(), "u", None, now).unwrap();
        let result = codec.decode_at(&token, now + Duration::seconds(age));

        if age > 600 {
            prop_assert_eq!(result, Err(StateError::Expired));
        } else {
            prop_assert!(result.is_ok());
        }
    }
}
