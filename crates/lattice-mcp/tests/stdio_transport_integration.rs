//! Byte-level scenarios against a server over the stdio framing: the
//! initialize handshake, framing resynchronization, cancellation
//! suppression, and progress propagation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::sync::Notify;

use common::{demo_server_builder, initialize_params, server_with_raw_pipe};
use lattice_mcp::integration::McpServerBuilder;
use lattice_mcp::protocol::{
    JsonRpcMessage, JsonRpcRequest, RequestId, Tool,
};
use lattice_mcp::providers::RegisteredTool;

#[tokio::test]
async fn test_stdio_initialize_handshake() {
    let (_server, mut pipe) = server_with_raw_pipe(demo_server_builder());

    pipe.send(&JsonRpcMessage::from_request(
        "initialize",
        Some(initialize_params()),
        RequestId::new_number(1),
    ))
    .await;

    let response = pipe.recv().await;
    let JsonRpcMessage::Response(response) = response else {
        panic!("expected initialize response, got {response:?}");
    };
    assert_eq!(response.id, Some(RequestId::new_number(1)));
    let result = response.result.expect("success");
    assert_eq!(result["protocolVersion"], "2025-11-25");
    assert_eq!(result["serverInfo"]["name"], "demo-server");
    // Registered features reflect in capabilities.
    assert!(result["capabilities"]["tools"].is_object());
    assert!(result["capabilities"]["resources"].is_object());
    assert!(result["capabilities"]["prompts"].is_object());
    assert!(result["capabilities"]["completions"].is_object());
    assert!(result["capabilities"]["logging"].is_object());

    // notifications/initialized is accepted without a reply.
    pipe.send(&JsonRpcMessage::from_notification(
        "notifications/initialized",
        None,
    ))
    .await;

    // A follow-up request still answers, and nothing was sent in between.
    pipe.send(&JsonRpcMessage::from_request(
        "ping",
        None,
        RequestId::new_number(2),
    ))
    .await;
    let response = pipe.recv().await;
    assert_eq!(
        response.request_id(),
        Some(&RequestId::new_number(2)),
        "initialized notification must not produce a reply"
    );
}

#[tokio::test]
async fn test_unknown_version_negotiates_to_newest() {
    let (_server, mut pipe) = server_with_raw_pipe(demo_server_builder());

    pipe.send(&JsonRpcMessage::from_request(
        "initialize",
        Some(json!({
            "protocolVersion": "1990-01-01",
            "capabilities": {},
            "clientInfo": {"name": "t", "version": "0"}
        })),
        RequestId::new_number(1),
    ))
    .await;

    let JsonRpcMessage::Response(response) = pipe.recv().await else {
        panic!("expected response");
    };
    assert_eq!(response.result.expect("success")["protocolVersion"], "2025-11-25");
}

#[tokio::test]
async fn test_malformed_frame_yields_parse_error_and_resyncs() {
    let (_server, mut pipe) = server_with_raw_pipe(demo_server_builder());

    pipe.send_raw(b"{\"jsonrpc\":\"2.0\"").await; // framed, but broken JSON
    let JsonRpcMessage::Response(parse_error) = pipe.recv().await else {
        panic!("expected parse error response");
    };
    assert_eq!(parse_error.error.expect("error").code, -32700);
    assert_eq!(parse_error.id, None);

    // The framing was not desynchronized: a valid request still answers.
    pipe.send(&JsonRpcMessage::from_request(
        "ping",
        None,
        RequestId::new_number(9),
    ))
    .await;
    let response = pipe.recv().await;
    assert_eq!(response.request_id(), Some(&RequestId::new_number(9)));
}

#[tokio::test]
async fn test_cancellation_suppresses_response() {
    // A tool that blocks on an external gate.
    let gate = Arc::new(Notify::new());
    let handler_gate = Arc::clone(&gate);
    let blocker = RegisteredTool::new(
        Tool {
            name: "blocker".into(),
            description: None,
            input_schema: json!({"type": "object"}),
            output_schema: None,
            annotations: None,
            execution: None,
        },
        move |_args| {
            let gate = Arc::clone(&handler_gate);
            async move {
                gate.notified().await;
                Ok("released")
            }
        },
    )
    .expect("valid tool");

    let builder = McpServerBuilder::new()
        .server_info("gate-server", "0.1.0")
        .with_tool(blocker);
    let (_server, mut pipe) = server_with_raw_pipe(builder);

    pipe.send(&JsonRpcMessage::from_request(
        "initialize",
        Some(initialize_params()),
        RequestId::new_number(1),
    ))
    .await;
    let _ = pipe.recv().await;

    pipe.send(&JsonRpcMessage::from_request(
        "tools/call",
        Some(json!({"name": "blocker", "arguments": {}})),
        RequestId::new_number(2),
    ))
    .await;

    // Cancel before releasing the gate.
    tokio::time::sleep(Duration::from_millis(50)).await;
    pipe.send(&JsonRpcMessage::from_notification(
        "notifications/cancelled",
        Some(json!({"requestId": 2, "reason": "demo"})),
    ))
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    gate.notify_one();

    // No response for id 2 may ever arrive. Prove the session is still
    // alive with a ping, which must be the next (and only) frame.
    pipe.send(&JsonRpcMessage::from_request(
        "ping",
        None,
        RequestId::new_number(3),
    ))
    .await;
    let next = pipe.recv().await;
    assert_eq!(
        next.request_id(),
        Some(&RequestId::new_number(3)),
        "response for the cancelled request leaked: {next:?}"
    );

    // And nothing else is buffered behind it.
    let mut probe = [0u8; 1];
    let extra = tokio::time::timeout(
        Duration::from_millis(200),
        pipe.reader.read(&mut probe),
    )
    .await;
    assert!(extra.is_err(), "unexpected extra bytes after suppression");
}

#[tokio::test]
async fn test_progress_notifications_for_tokened_request() {
    let stepper = RegisteredTool::new(
        Tool {
            name: "stepper".into(),
            description: None,
            input_schema: json!({"type": "object"}),
            output_schema: None,
            annotations: None,
            execution: None,
        },
        |_args| async move {
            for step in 1..=2 {
                lattice_mcp::integration::send_progress(
                    step as f64,
                    Some(2.0),
                    Some(format!("step {step}")),
                )
                .await?;
            }
            Ok("done")
        },
    )
    .expect("valid tool");

    let builder = McpServerBuilder::new()
        .server_info("progress-server", "0.1.0")
        .with_tool(stepper);
    let (_server, mut pipe) = server_with_raw_pipe(builder);

    pipe.send(&JsonRpcMessage::from_request(
        "initialize",
        Some(initialize_params()),
        RequestId::new_number(1),
    ))
    .await;
    let _ = pipe.recv().await;

    pipe.send(&JsonRpcMessage::Request(JsonRpcRequest::new(
        "tools/call",
        Some(json!({
            "name": "stepper",
            "arguments": {},
            "_meta": {"progressToken": "tok-1"}
        })),
        RequestId::new_number(2),
    )))
    .await;

    // Two progress notifications precede the response.
    for expected_step in 1..=2 {
        let message = pipe.recv().await;
        let JsonRpcMessage::Notification(notification) = message else {
            panic!("expected progress notification, got {message:?}");
        };
        assert_eq!(notification.method, "notifications/progress");
        let params = notification.params.expect("params");
        assert_eq!(params["progressToken"], "tok-1");
        assert_eq!(params["progress"], expected_step as f64);
    }

    let response = pipe.recv().await;
    assert_eq!(response.request_id(), Some(&RequestId::new_number(2)));
}

#[tokio::test]
async fn test_progress_without_token_is_silent() {
    let quiet = RegisteredTool::new(
        Tool {
            name: "quiet".into(),
            description: None,
            input_schema: json!({"type": "object"}),
            output_schema: None,
            annotations: None,
            execution: None,
        },
        |_args| async move {
            lattice_mcp::integration::send_progress(1.0, None, None).await?;
            Ok("done")
        },
    )
    .expect("valid tool");

    let builder = McpServerBuilder::new()
        .server_info("quiet-server", "0.1.0")
        .with_tool(quiet);
    let (_server, mut pipe) = server_with_raw_pipe(builder);

    pipe.send(&JsonRpcMessage::from_request(
        "initialize",
        Some(initialize_params()),
        RequestId::new_number(1),
    ))
    .await;
    let _ = pipe.recv().await;

    pipe.send(&JsonRpcMessage::from_request(
        "tools/call",
        Some(json!({"name": "quiet", "arguments": {}})),
        RequestId::new_number(2),
    ))
    .await;

    // The next frame is the response itself: no progress leaked.
    let message = pipe.recv().await;
    assert_eq!(message.request_id(), Some(&RequestId::new_number(2)));
}

#[tokio::test]
async fn test_duplicate_request_id_rejected() {
    let gate = Arc::new(Notify::new());
    let handler_gate = Arc::clone(&gate);
    let blocker = RegisteredTool::new(
        Tool {
            name: "blocker".into(),
            description: None,
            input_schema: json!({"type": "object"}),
            output_schema: None,
            annotations: None,
            execution: None,
        },
        move |_args| {
            let gate = Arc::clone(&handler_gate);
            async move {
                gate.notified().await;
                Ok("released")
            }
        },
    )
    .expect("valid tool");

    let builder = McpServerBuilder::new()
        .server_info("dup-server", "0.1.0")
        .with_tool(blocker);
    let (_server, mut pipe) = server_with_raw_pipe(builder);

    pipe.send(&JsonRpcMessage::from_request(
        "tools/call",
        Some(json!({"name": "blocker", "arguments": {}})),
        RequestId::new_number(7),
    ))
    .await;
    pipe.send(&JsonRpcMessage::from_request(
        "tools/call",
        Some(json!({"name": "blocker", "arguments": {}})),
        RequestId::new_number(7),
    ))
    .await;

    let JsonRpcMessage::Response(response) = pipe.recv().await else {
        panic!("expected duplicate-id response");
    };
    assert_eq!(response.error.expect("error").code, -32600);
    gate.notify_waiters();
}
