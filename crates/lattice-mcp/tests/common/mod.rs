//! Shared harnesses for the integration tests: framed raw pipes for
//! byte-level scenarios and a connected server/client pair over in-memory
//! duplex streams.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};

use lattice_mcp::integration::{McpClient, McpClientBuilder, McpServer, McpServerBuilder};
use lattice_mcp::protocol::{
    JsonRpcMessage, JsonRpcMessageTrait, Prompt, PromptArgument, Resource, ResourceContents,
    ResourceTemplate, Tool,
};
use lattice_mcp::providers::{
    Completer, RegisteredPrompt, RegisteredResource, RegisteredResourceTemplate, RegisteredTool,
};
use lattice_mcp::transport::{encode_frame, FrameCodec, StdioTransport};

/// Raw framed peer: writes and reads Content-Length framed messages over
/// duplex halves, standing in for a real byte-level client.
pub struct RawPipe {
    pub writer: WriteHalf<tokio::io::DuplexStream>,
    pub reader: ReadHalf<tokio::io::DuplexStream>,
    codec: FrameCodec,
}

impl RawPipe {
    pub fn new(
        writer: WriteHalf<tokio::io::DuplexStream>,
        reader: ReadHalf<tokio::io::DuplexStream>,
    ) -> Self {
        Self {
            writer,
            reader,
            codec: FrameCodec::new(),
        }
    }

    pub async fn send(&mut self, message: &JsonRpcMessage) {
        let payload = message.to_bytes().expect("serialize");
        self.writer
            .write_all(&encode_frame(&payload))
            .await
            .expect("write frame");
        self.writer.flush().await.expect("flush");
    }

    pub async fn send_raw(&mut self, payload: &[u8]) {
        self.writer
            .write_all(&encode_frame(payload))
            .await
            .expect("write frame");
        self.writer.flush().await.expect("flush");
    }

    pub async fn recv(&mut self) -> JsonRpcMessage {
        let mut chunk = [0u8; 8192];
        loop {
            if let Some(frame) = self.codec.next_frame().expect("framing") {
                return JsonRpcMessage::parse(&frame).expect("valid message");
            }
            let n = self.reader.read(&mut chunk).await.expect("read");
            assert!(n > 0, "stream closed before a full frame arrived");
            self.codec.extend(&chunk[..n]).expect("framing buffer");
        }
    }
}

/// A demo server with five tools (for pagination), a concrete resource, a
/// resource template, a prompt, and a completer.
pub fn demo_server_builder() -> McpServerBuilder {
    let mut builder = McpServerBuilder::new()
        .server_info("demo-server", "0.1.0")
        .instructions("Demo server for integration tests")
        .page_size(2);

    for name in ["tool-alpha", "tool-beta", "tool-gamma", "tool-delta", "tool-epsilon"] {
        let tool = RegisteredTool::new(
            Tool {
                name: name.to_string(),
                description: Some(format!("The {name} tool")),
                input_schema: json!({"type": "object"}),
                output_schema: None,
                annotations: None,
                execution: None,
            },
            move |args| async move { Ok(Value::Object(args)) },
        )
        .expect("valid tool");
        builder = builder.with_tool(tool);
    }

    let clock = RegisteredResource::new(
        Resource {
            uri: "info://clock".into(),
            name: "clock".into(),
            description: Some("Current time".into()),
            mime_type: Some("text/plain".into()),
            annotations: None,
        },
        || async { Ok(vec![ResourceContents::text("info://clock", "12:00")]) },
    );
    builder = builder.with_resource(clock);

    let rows = RegisteredResourceTemplate::new(
        ResourceTemplate {
            uri_template: "db://{table}/{id}".into(),
            name: "rows".into(),
            description: None,
            mime_type: Some("application/json".into()),
            annotations: None,
        },
        |bindings: HashMap<String, String>| async move {
            let uri = format!("db://{}/{}", bindings["table"], bindings["id"]);
            Ok(vec![ResourceContents::text(
                uri,
                json!({"table": bindings["table"], "id": bindings["id"]}).to_string(),
            )])
        },
    )
    .expect("valid template");
    builder = builder.with_resource_template(rows);

    let greet = RegisteredPrompt::new(
        Prompt {
            name: "greet".into(),
            description: Some("Greets someone".into()),
            arguments: vec![PromptArgument {
                name: "who".into(),
                description: None,
                required: Some(true),
            }],
        },
        |args: HashMap<String, String>| async move { Ok(format!("Say hello to {}", args["who"])) },
    );
    builder = builder.with_prompt(greet);

    let completer = Completer::for_prompt("greet", |_arg, partial, _ctx| async move {
        let names = ["Ada", "Alan", "Grace", "Edsger"];
        Ok(names
            .iter()
            .filter(|n| n.starts_with(&partial))
            .map(|n| n.to_string())
            .collect::<Vec<_>>())
    });
    builder.with_completer(completer)
}

/// A server (from the given builder) and a connected client, wired over
/// in-memory duplex streams through the real stdio framing.
pub fn connected_pair(builder: McpServerBuilder) -> (McpServer, McpClient) {
    let (server_end, client_end) = tokio::io::duplex(256 * 1024);
    let (server_read, server_write) = tokio::io::split(server_end);
    let (client_read, client_write) = tokio::io::split(client_end);

    let (server_transport, server_inbound) = StdioTransport::from_io(server_read, server_write);
    let server = builder
        .serve(Arc::new(server_transport), server_inbound)
        .expect("server starts");

    let (client_transport, client_inbound) = StdioTransport::from_io(client_read, client_write);
    let client = McpClientBuilder::new()
        .client_info("demo-client", "0.1.0")
        .connect(Arc::new(client_transport), client_inbound)
        .expect("client connects");

    (server, client)
}

/// A demo server wired to a raw framed pipe standing in for the client.
pub fn server_with_raw_pipe(builder: McpServerBuilder) -> (McpServer, RawPipe) {
    let (server_end, client_end) = tokio::io::duplex(256 * 1024);
    let (server_read, server_write) = tokio::io::split(server_end);
    let (client_read, client_write) = tokio::io::split(client_end);

    let (server_transport, server_inbound) = StdioTransport::from_io(server_read, server_write);
    let server = builder
        .serve(Arc::new(server_transport), server_inbound)
        .expect("server starts");

    (server, RawPipe::new(client_write, client_read))
}

/// Standard initialize request params used by the raw-pipe tests.
pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": "2025-11-25",
        "capabilities": {},
        "clientInfo": {"name": "t", "version": "0"}
    })
}
