//! Property-based tests for purelymail-mcp
//!
//! These tests verify invariants that must hold for all inputs:
//! - Envelope validation never panics
//! - Notifications are never answered
//! - Replies always carry the request id
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|f| json!(f)),
        "\\PC{0,20}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

// ============================================================================
// ENVELOPE VALIDATION TESTS
// ============================================================================

mod envelope_tests {
    use super::*;
    use purelymail_mcp::mcp::{InboundMessage, RequestId};

    proptest! {
        /// Invariant: parsing never panics on any JSON value
        #[test]
        fn never_panics(value in arb_json()) {
            let _ = InboundMessage::parse(value);
        }

        /// Invariant: envelopes with a field set that looks valid are accepted
        #[test]
        fn valid_envelopes_accepted(id in any::<i64>(), method in "[a-z/_]{1,30}") {
            let msg = InboundMessage::parse(json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method.clone(),
            }));
            prop_assert!(msg.is_ok());
            let msg = msg.unwrap();
            prop_assert_eq!(msg.id, Some(RequestId::Number(id)));
            prop_assert_eq!(msg.method, method);
        }

        /// Invariant: any version other than "2.0" is rejected with the id echoed
        #[test]
        fn wrong_version_rejected(version in "\\PC{0,6}", id in "[a-z0-9]{1,12}") {
            prop_assume!(version != "2.0");
            let rejection = InboundMessage::parse(json!({
                "jsonrpc": version,
                "id": id.clone(),
                "method": "ping",
            }))
            .unwrap_err();
            prop_assert_eq!(rejection.error.code(), -32600);
            prop_assert_eq!(rejection.id, Some(RequestId::String(id)));
        }
    }
}

// ============================================================================
// DISPATCH TESTS
// ============================================================================

mod dispatch_tests {
    use super::*;
    use std::sync::Arc;

    use purelymail_mcp::integrations::{PurelymailClient, PurelymailConfig};
    use purelymail_mcp::mcp::{purelymail_registry, Dispatcher, InboundMessage, McpHandler, RequestId};

    fn dispatcher() -> Dispatcher {
        // Unroutable base URL: tests below never reach a successful upstream call
        let config = PurelymailConfig::new("k").with_base_url("http://127.0.0.1:9");
        let client = Arc::new(PurelymailClient::new(config).unwrap());
        Dispatcher::new(Arc::new(purelymail_registry(client).unwrap()))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Invariant: notifications never produce a reply, whatever the method
        #[test]
        fn notifications_never_reply(method in "\\PC{0,30}", params in arb_json()) {
            let params = if params.is_object() { params } else { json!({}) };
            let d = dispatcher();
            let reply = tokio_test::block_on(
                d.handle(InboundMessage::notification(method, params)),
            );
            prop_assert!(reply.is_none());
        }

        /// Invariant: every request gets exactly one reply with its own id
        #[test]
        fn requests_reply_with_same_id(id in any::<i64>(), method in "[a-z/_]{0,30}") {
            prop_assume!(method != "tools/call");
            let d = dispatcher();
            let reply = tokio_test::block_on(
                d.handle(InboundMessage::request(id, method, json!({}))),
            );
            prop_assert!(reply.is_some());
            prop_assert_eq!(reply.unwrap().id, Some(RequestId::Number(id)));
        }

        /// Invariant: unknown tool names always list every registered tool
        #[test]
        fn unknown_tool_lists_all(name in "[A-Z]{1,20}") {
            let d = dispatcher();
            let reply = tokio_test::block_on(d.handle(InboundMessage::request(
                1,
                "tools/call",
                json!({"name": name, "arguments": {}}),
            )))
            .unwrap();
            let error = reply.error.unwrap();
            prop_assert_eq!(error.code, -32601);
            let listed = error.data.unwrap()["availableTools"].as_array().unwrap().len();
            prop_assert_eq!(listed, d.registry().len());
        }
    }
}
