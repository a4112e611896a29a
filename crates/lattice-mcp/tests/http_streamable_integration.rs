//! Streamable HTTP surface tests: the validation chain, session id
//! lifecycle, SSE replay, and a full client↔server loop over a real
//! listener.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{demo_server_builder, initialize_params};
use lattice_mcp::auth::{AuthRequirements, AuthVerdict};
use lattice_mcp::integration::{McpClientBuilder, McpServer};
use lattice_mcp::protocol::JsonRpcMessage;
use lattice_mcp::transport::http::{
    HttpAuthConfig, HttpClientConfig, HttpServerConfig, HttpServerTransport, StreamableHttpClient,
};
use lattice_mcp::transport::sse::{SseEvent, SseParser};
use lattice_mcp::transport::Transport;

fn http_harness(config: HttpServerConfig) -> (Router, McpServer, HttpServerTransport) {
    let (transport, inbound) = HttpServerTransport::new(config);
    let server = demo_server_builder()
        .serve(Arc::new(transport.clone()), inbound)
        .expect("server starts");
    (transport.router(), server, transport)
}

fn post_body(message: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("accept", "application/json, text/event-stream")
        .header("content-type", "application/json")
        .body(Body::from(message.to_string()))
        .expect("request")
}

fn initialize_message() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": initialize_params()
    })
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Read SSE events off a streaming body until `count` have arrived.
async fn read_events(body: Body, count: usize) -> Vec<SseEvent> {
    let mut stream = body.into_data_stream();
    let mut parser = SseParser::new();
    let mut events = Vec::new();

    while events.len() < count {
        let chunk = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("event before timeout")
            .expect("stream open")
            .expect("chunk");
        events.extend(parser.feed(&chunk));
    }
    events
}

#[tokio::test]
async fn test_session_id_lifecycle() {
    let (router, _server, _transport) = http_harness(HttpServerConfig::default());

    // Initialize: 200 with a session id header.
    let response = router
        .clone()
        .oneshot(post_body(initialize_message()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let session_id = response
        .headers()
        .get("mcp-session-id")
        .expect("session header")
        .to_str()
        .expect("ascii")
        .to_string();
    let body = body_json(response).await;
    assert_eq!(body["result"]["serverInfo"]["name"], "demo-server");

    let list = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"});

    // Without the session header: 400.
    let response = router
        .clone()
        .oneshot(post_body(list.clone()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // With an unknown session id: 404.
    let mut request = post_body(list.clone());
    request
        .headers_mut()
        .insert("mcp-session-id", "bogus".parse().expect("value"));
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // With the minted id: 200.
    let mut request = post_body(list.clone());
    request
        .headers_mut()
        .insert("mcp-session-id", session_id.parse().expect("value"));
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["result"]["tools"].is_array());

    // DELETE terminates the session: 204.
    let request = Request::builder()
        .method("DELETE")
        .uri("/mcp")
        .header("mcp-session-id", session_id.as_str())
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The old id now answers 404.
    let mut request = post_body(list);
    request
        .headers_mut()
        .insert("mcp-session-id", session_id.parse().expect("value"));
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_chain_ordering_and_codes() {
    let (router, _server, _transport) = http_harness(HttpServerConfig {
        allowed_origins: vec!["http://trusted.example".to_string()],
        ..HttpServerConfig::default()
    });

    // Origin not on the allow-list: 403 (checked before everything else).
    let mut request = post_body(initialize_message());
    request
        .headers_mut()
        .insert("origin", "http://evil.example".parse().expect("value"));
    request
        .headers_mut()
        .insert("mcp-protocol-version", "not-a-version".parse().expect("value"));
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Allowed origin, bad protocol version: 400.
    let mut request = post_body(initialize_message());
    request
        .headers_mut()
        .insert("origin", "http://trusted.example".parse().expect("value"));
    request
        .headers_mut()
        .insert("mcp-protocol-version", "not-a-version".parse().expect("value"));
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing text/event-stream in Accept: 406.
    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("accept", "application/json")
        .header("content-type", "application/json")
        .body(Body::from(initialize_message().to_string()))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

    // Wrong Content-Type: 415.
    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("accept", "application/json, text/event-stream")
        .header("content-type", "text/plain")
        .body(Body::from(initialize_message().to_string()))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // GET without text/event-stream in Accept: 406.
    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header("accept", "application/json")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

    // An unmatched path is 404 before any of the above.
    let request = Request::builder()
        .method("POST")
        .uri("/elsewhere")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_origin_allowlist_rejects_any_origin() {
    let (router, _server, _transport) = http_harness(HttpServerConfig::default());

    let mut request = post_body(initialize_message());
    request
        .headers_mut()
        .insert("origin", "http://anything.example".parse().expect("value"));
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bearer_validation_gates() {
    let validator = |header: Option<&str>| match header {
        Some("Bearer strong") => AuthVerdict::allow(vec!["mcp:read".to_string()]),
        Some("Bearer weak") => AuthVerdict::allow(vec![]),
        _ => AuthVerdict::deny("unknown token"),
    };
    let (router, _server, _transport) = http_harness(HttpServerConfig {
        auth: Some(HttpAuthConfig {
            validator: Arc::new(validator),
            requirements: AuthRequirements {
                required_scopes: vec!["mcp:read".to_string()],
                resource_metadata_url: Some("https://rs.example/.well-known/mcp".to_string()),
            },
        }),
        ..HttpServerConfig::default()
    });

    // No credential: 401 with a challenge.
    let response = router
        .clone()
        .oneshot(post_body(initialize_message()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .expect("challenge")
        .to_str()
        .expect("ascii");
    assert!(challenge.contains("resource_metadata"));

    // Valid credential, missing scope: 403 with a scope hint.
    let mut request = post_body(initialize_message());
    request
        .headers_mut()
        .insert("authorization", "Bearer weak".parse().expect("value"));
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .expect("challenge")
        .to_str()
        .expect("ascii");
    assert!(challenge.contains("insufficient_scope"));

    // Full credential: through to dispatch.
    let mut request = post_body(initialize_message());
    request
        .headers_mut()
        .insert("authorization", "Bearer strong".parse().expect("value"));
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_notification_post_returns_202() {
    let (router, _server, _transport) = http_harness(HttpServerConfig {
        require_session: false,
        ..HttpServerConfig::default()
    });

    let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let response = router
        .clone()
        .oneshot(post_body(notification))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_malformed_post_body_is_parse_error() {
    let (router, _server, _transport) = http_harness(HttpServerConfig::default());

    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("accept", "application/json, text/event-stream")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_delete_disabled_is_405() {
    let (router, _server, _transport) = http_harness(HttpServerConfig {
        allow_session_delete: false,
        require_session: false,
        ..HttpServerConfig::default()
    });

    let request = Request::builder()
        .method("DELETE")
        .uri("/mcp")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_sse_replay_after_reconnect() {
    let (router, _server, transport) = http_harness(HttpServerConfig {
        require_session: false,
        ..HttpServerConfig::default()
    });

    // Open a GET stream and learn the stream id from the priming event.
    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header("accept", "text/event-stream")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .expect("content type")
        .to_str()
        .expect("ascii")
        .starts_with("text/event-stream"));
    let body = response.into_body();

    // Server-initiated traffic lands on the stream with seq 1..=3.
    for n in 1..=3 {
        transport
            .send(JsonRpcMessage::from_notification(
                "notifications/message",
                Some(json!({"level": "info", "data": n})),
            ))
            .await
            .expect("steer");
    }

    let events = read_events(body, 4).await;
    let priming = &events[0];
    let stream_id = priming
        .id
        .as_ref()
        .expect("priming id")
        .strip_suffix(":0")
        .expect("seq 0")
        .to_string();
    for (i, event) in events[1..].iter().enumerate() {
        assert_eq!(
            event.id.as_deref(),
            Some(format!("{stream_id}:{}", i + 1).as_str())
        );
    }

    // Reconnect with Last-Event-ID = seq 2: only seq 3 replays, in order,
    // never seq 1 or 2 again.
    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header("accept", "text/event-stream")
        .header("last-event-id", format!("{stream_id}:2"))
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let replayed = read_events(response.into_body(), 1).await;
    assert_eq!(
        replayed[0].id.as_deref(),
        Some(format!("{stream_id}:3").as_str())
    );
    let payload: Value = serde_json::from_str(&replayed[0].data).expect("json");
    assert_eq!(payload["params"]["data"], 3);
}

#[tokio::test]
async fn test_unknown_stream_resume_is_204() {
    let (router, _server, _transport) = http_harness(HttpServerConfig {
        require_session: false,
        ..HttpServerConfig::default()
    });

    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header("accept", "text/event-stream")
        .header("last-event-id", "vanished:7")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_full_loop_over_real_listener() {
    let (router, _server, _transport) = http_harness(HttpServerConfig::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let endpoint = format!("http://{addr}/mcp");
    let (transport, inbound) = StreamableHttpClient::new(HttpClientConfig::new(endpoint));
    let transport = Arc::new(transport);
    let client = McpClientBuilder::new()
        .client_info("http-client", "0.1.0")
        .connect(Arc::clone(&transport) as Arc<dyn Transport>, inbound)
        .expect("client connects");

    let result = client.initialize().await.expect("initialize");
    assert_eq!(result.server_info.name, "demo-server");
    assert!(transport.session_id().await.is_some());

    let tools = client.list_tools(None).await.expect("tools");
    assert_eq!(tools.tools.len(), 2); // demo server page size

    let mut args = serde_json::Map::new();
    args.insert("text".into(), json!("over http"));
    let call = client
        .call_tool("tool-alpha", Some(args))
        .await
        .expect("call");
    assert!(call.content[0]
        .as_text()
        .expect("text")
        .contains("over http"));

    client.close().await.expect("close");
}
