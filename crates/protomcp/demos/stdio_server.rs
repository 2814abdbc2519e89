//! A minimal MCP server over stdio: one `echo` tool, nothing else.

use std::sync::Arc;

use protomcp::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let mux = Arc::new(ServerMux::new());
    mux.handle_tool(
        Tool::new("echo", serde_json::json!({"type": "object"})).with_description("echoes its arguments back"),
        Arc::new(ToolHandlerFn(|arguments: Option<serde_json::Value>| async move {
            Ok::<_, McpError>(vec![Content::binary("application/json", arguments.unwrap_or(serde_json::Value::Null))])
        })),
    );

    let transport: Arc<dyn Transport> = Arc::new(StdioTransport::new());
    let session = ServerSession::accept(transport, mux, ServerOptions::default()).await?;

    tokio::signal::ctrl_c().await?;
    session.shutdown().await?;
    Ok(())
}
