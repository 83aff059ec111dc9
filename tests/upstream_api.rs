//! Tool execution against an in-process fake Purelymail API
//!
//! Run with: cargo test --test upstream_api

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use purelymail_mcp::integrations::{PurelymailClient, PurelymailConfig};
use purelymail_mcp::mcp::{purelymail_registry, Dispatcher, InboundMessage, McpHandler};
use purelymail_mcp::GatewayError;

async fn operation(Path(op): Path<String>, headers: HeaderMap, body: Bytes) -> Response {
    let token = headers
        .get("purelymail-api-token")
        .and_then(|v| v.to_str().ok())
        .map(|v| json!(v))
        .unwrap_or(Value::Null);
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    match op.as_str() {
        "listUser" => Json(json!({
            "type": "success",
            "result": {"users": ["alice@example.com"], "token": token, "body": body}
        }))
        .into_response(),
        "createRoutingRule" => Json(json!({
            "type": "success",
            "result": {"received": body}
        }))
        .into_response(),
        "deleteUser" => Json(json!({
            "type": "error",
            "code": "noSuchUser",
            "message": "No user exists with that name"
        }))
        .into_response(),
        "deleteAppPassword" => StatusCode::OK.into_response(),
        "checkAccountCredit" => (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_fake_api() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/api/v0/:op", post(operation));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn client() -> Arc<PurelymailClient> {
    let addr = spawn_fake_api().await;
    let config = PurelymailConfig::new("test-token").with_base_url(format!("http://{}", addr));
    Arc::new(PurelymailClient::new(config).unwrap())
}

async fn dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(purelymail_registry(client().await).unwrap()))
}

async fn call_tool(dispatcher: &Dispatcher, name: &str, arguments: Value) -> Value {
    let response = dispatcher
        .handle(InboundMessage::request(
            1,
            "tools/call",
            json!({"name": name, "arguments": arguments}),
        ))
        .await
        .unwrap();
    assert!(response.error.is_none(), "{:?}", response.error);
    response.result.unwrap()
}

fn embedded(result: &Value) -> Value {
    serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap()
}

fn text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn test_call_sends_token_header_and_unwraps_result() {
    let client = client().await;
    let value = client.call("listUser", &json!({})).await.unwrap();
    assert_eq!(value["token"], "test-token");
    assert_eq!(value["users"], json!(["alice@example.com"]));
    assert_eq!(value["body"], json!({}));
}

#[tokio::test]
async fn test_error_envelope_becomes_upstream_error() {
    let client = client().await;
    let err = client
        .call("deleteUser", &json!({"userName": "ghost@example.com"}))
        .await
        .unwrap_err();
    match err {
        GatewayError::Upstream { status, body } => {
            assert_eq!(status, 200);
            assert!(body.contains("noSuchUser"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_non_success_status_becomes_upstream_error() {
    let client = client().await;
    let err = client.call("checkAccountCredit", &json!({})).await.unwrap_err();
    match err {
        GatewayError::Upstream { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_routing_rule_tool_sends_arguments_as_body() {
    let dispatcher = dispatcher().await;
    let result = call_tool(
        &dispatcher,
        "createRoutingRule",
        json!({
            "domainName": "example.com",
            "matchUser": "sales",
            "prefix": false,
            "targetAddresses": ["alice@example.com"],
            "catchall": null
        }),
    )
    .await;

    assert!(result.get("isError").is_none());
    assert_eq!(
        embedded(&result)["received"],
        json!({
            "domainName": "example.com",
            "matchUser": "sales",
            "prefix": false,
            "targetAddresses": ["alice@example.com"]
        })
    );
}

#[tokio::test]
async fn test_empty_response_body() {
    let dispatcher = dispatcher().await;
    let result = call_tool(
        &dispatcher,
        "deleteAppPassword",
        json!({"userHandle": "alice@example.com", "appPassword": "xyz"}),
    )
    .await;

    assert_eq!(embedded(&result), json!({}));
}

#[tokio::test]
async fn test_upstream_rejection_is_business_error() {
    let dispatcher = dispatcher().await;
    let result = call_tool(&dispatcher, "deleteUser", json!({"userName": "ghost@example.com"})).await;

    assert_eq!(result["isError"], true);
    assert!(text(&result).contains("No user exists"), "{}", text(&result));
}

#[tokio::test]
async fn test_missing_required_argument_skips_upstream() {
    let dispatcher = dispatcher().await;
    let result = call_tool(
        &dispatcher,
        "createRoutingRule",
        json!({"domainName": "example.com"}),
    )
    .await;

    assert_eq!(result["isError"], true);
    assert!(text(&result).contains("matchUser"), "{}", text(&result));
    assert!(text(&result).contains("targetAddresses"), "{}", text(&result));
}
