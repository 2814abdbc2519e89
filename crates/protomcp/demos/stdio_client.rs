//! Runs a client and an `echo`-serving server in one process, connected by
//! an in-memory duplex pipe, to show the full dial/list/call round trip
//! without needing a second binary on `PATH`.

use std::sync::Arc;

use protomcp::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let (client_read, server_write) = tokio::io::duplex(64 * 1024);
    let (server_read, client_write) = tokio::io::duplex(64 * 1024);

    let server_mux = Arc::new(ServerMux::new());
    server_mux.handle_tool(
        Tool::new("echo", serde_json::json!({"type": "object"})).with_description("echoes its arguments back"),
        Arc::new(ToolHandlerFn(|arguments: Option<serde_json::Value>| async move {
            Ok::<_, McpError>(vec![Content::binary("application/json", arguments.unwrap_or(serde_json::Value::Null))])
        })),
    );
    let server_transport: Arc<dyn Transport> =
        Arc::new(StdioTransport::from_io(Box::pin(server_read), Box::pin(server_write), Default::default()));
    let server_session = ServerSession::accept(server_transport, server_mux, ServerOptions::default()).await?;

    let client_transport: Arc<dyn Transport> =
        Arc::new(StdioTransport::from_io(Box::pin(client_read), Box::pin(client_write), Default::default()));
    let client_mux = Arc::new(ClientMux::new());
    let session = ClientSession::dial(client_transport, client_mux, ClientOptions::default()).await?;

    let cancel = CancellationToken::new();
    let tools = session.list_tools(&cancel).await?;
    println!("server exposes {} tool(s): {:?}", tools.len(), tools.iter().map(|t| &t.name).collect::<Vec<_>>());

    let contents = session.call_tool(&cancel, "echo", Some(serde_json::json!({"hello": "world"}))).await?;
    println!("echo replied: {contents:?}");

    session.close().await?;
    server_session.close().await?;
    Ok(())
}
