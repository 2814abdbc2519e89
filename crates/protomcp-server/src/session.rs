//! `ServerSession`: one accepted peer connection, past the `initialize`
//! handshake and dispatching inbound requests against a [`ServerMux`].

use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tracing::{debug, warn};

use protomcp_transport::{CancellationToken, Transport, TransportError};
use protomcp_types::{Capabilities, Implementation, McpError, Method, ProtocolVersion, Root, SamplingMessage, marshal_contents};

use crate::error::{ServerError, ServerResult};
use crate::mux::ServerMux;

/// Server-supplied configuration for the `initialize` handshake: the
/// booleans feed capability composition, `extra` is spread verbatim into
/// the initialize result alongside `protocolVersion`/`capabilities`/`serverInfo`.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub protocol_version: ProtocolVersion,
    pub server_info: Implementation,
    pub tools_list_changed: bool,
    pub resources_list_changed: bool,
    pub resources_subscribe: bool,
    pub prompts_list_changed: bool,
    pub additional_capabilities: Capabilities,
    pub extra: serde_json::Map<String, Value>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::default_version(),
            server_info: Implementation::new("protomcp-server", env!("CARGO_PKG_VERSION")),
            tools_list_changed: true,
            resources_list_changed: true,
            resources_subscribe: true,
            prompts_list_changed: true,
            additional_capabilities: Capabilities::new(),
            extra: serde_json::Map::new(),
        }
    }
}

impl ServerOptions {
    fn capabilities(&self) -> Capabilities {
        let mut defaults = Capabilities::new();
        set_flag(&mut defaults, "tools", "listChanged", self.tools_list_changed);
        set_flag(&mut defaults, "resources", "listChanged", self.resources_list_changed);
        set_flag(&mut defaults, "resources", "subscribe", self.resources_subscribe);
        set_flag(&mut defaults, "prompts", "listChanged", self.prompts_list_changed);
        self.additional_capabilities.clone().merge(defaults)
    }
}

fn set_flag(caps: &mut Capabilities, feature: &str, flag: &str, value: bool) {
    if value {
        caps.enable(feature, flag);
    } else {
        caps.disable(feature, flag);
    }
}

/// One accepted peer connection.
pub struct ServerSession {
    transport: Arc<dyn Transport>,
    mux: Arc<ServerMux>,
    client_capabilities: SyncMutex<Capabilities>,
    dispatch_cancel: CancellationToken,
}

impl ServerSession {
    /// Perform the `initialize` handshake over `transport` and, on success,
    /// start the background inbound-dispatch and change-broadcaster tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotInitializeFirst`] if the peer's first
    /// request is not `initialize`, or [`ServerError::ProtocolVersionMismatch`]
    /// if it names a version other than `options.protocol_version`.
    pub async fn accept(transport: Arc<dyn Transport>, mux: Arc<ServerMux>, options: ServerOptions) -> ServerResult<Arc<Self>> {
        let handshake_cancel = CancellationToken::new();
        let (request, writer) = transport.accept_request(&handshake_cancel).await?;

        if request.method != Method::Initialize.as_str() {
            return Err(ServerError::NotInitializeFirst(request.method));
        }

        let params = request
            .params
            .ok_or_else(|| ServerError::MalformedHandshake("initialize params missing".into()))?;

        let requested_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::MalformedHandshake("protocolVersion missing".into()))?
            .to_string();

        if requested_version != options.protocol_version.as_str() {
            let err = ServerError::ProtocolVersionMismatch {
                expected: options.protocol_version.as_str().to_string(),
                actual: requested_version,
            };
            let _ = writer
                .close_with_error(protomcp_types::ErrorCode::InvalidRequest.code(), err.to_string(), None)
                .await;
            return Err(err);
        }

        let client_capabilities: Capabilities = match params.get("capabilities") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ServerError::MalformedHandshake(format!("capabilities: {e}")))?,
            None => Capabilities::new(),
        };

        let mut result = options.extra.clone();
        result.insert("protocolVersion".into(), Value::String(options.protocol_version.as_str().to_string()));
        result.insert("capabilities".into(), serde_json::to_value(options.capabilities()).expect("capabilities serialize"));
        result.insert("serverInfo".into(), serde_json::to_value(&options.server_info).expect("implementation serialize"));

        writer.write_result(Value::Object(result)).await?;

        let session = Arc::new(Self {
            transport,
            mux,
            client_capabilities: SyncMutex::new(client_capabilities),
            dispatch_cancel: handshake_cancel,
        });

        session.clone().spawn_dispatch_loop();
        session.clone().spawn_broadcaster(session.mux.tools().change_signal(), Method::NotifyToolsListChanged);
        session
            .clone()
            .spawn_broadcaster(session.mux.resources().change_signal(), Method::NotifyResourcesListChanged);
        session.clone().spawn_broadcaster(session.mux.prompts().change_signal(), Method::NotifyPromptsListChanged);

        Ok(session)
    }

    #[must_use]
    pub fn client_capabilities(&self) -> Capabilities {
        self.client_capabilities.lock().clone()
    }

    #[must_use]
    pub fn mux(&self) -> &Arc<ServerMux> {
        &self.mux
    }

    /// Ask the connected client to enumerate its roots.
    pub async fn list_roots(&self, cancel: &CancellationToken) -> ServerResult<Vec<Root>> {
        let result = self.transport.request_sync(cancel, Method::RootsList.as_str(), None).await?;
        let roots = result.get("roots").cloned().ok_or_else(|| ServerError::Mcp(McpError::parse_error("missing roots")))?;
        serde_json::from_value(roots).map_err(|e| ServerError::Mcp(McpError::parse_error(e)))
    }

    /// Ask the connected client to sample a message, per `sampling/createMessage`.
    pub async fn sample(&self, cancel: &CancellationToken, params: Value) -> ServerResult<SamplingMessage> {
        let result = self
            .transport
            .request_sync(cancel, Method::SamplingCreateMessage.as_str(), Some(params))
            .await?;
        serde_json::from_value(result).map_err(|e| ServerError::Mcp(McpError::parse_error(e)))
    }

    /// Push `notifications/resources/updated` for `uri` if the peer
    /// subscribed to it; a no-op otherwise.
    pub async fn notify_resource_updated(&self, uri: &str) -> ServerResult<()> {
        if !self.mux.resources().is_subscribed(uri) {
            return Ok(());
        }
        self.transport
            .notify(Method::NotifyResourcesUpdated.as_str(), Some(serde_json::json!({ "uri": uri })))
            .await?;
        Ok(())
    }

    /// Cancel the dispatch loop and close the transport. Idempotent.
    pub async fn close(&self) -> ServerResult<()> {
        self.dispatch_cancel.cancel();
        self.transport.close().await?;
        Ok(())
    }

    /// At minimum equivalent to [`ServerSession::close`]; reserved for a
    /// future orderly shutdown exchange.
    pub async fn shutdown(&self) -> ServerResult<()> {
        self.close().await
    }

    fn spawn_dispatch_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let (request, writer) = match self.transport.accept_request(&self.dispatch_cancel).await {
                    Ok(pair) => pair,
                    Err(_) => {
                        debug!("dispatch loop exiting: transport closed or cancelled");
                        return;
                    }
                };
                let session = self.clone();
                tokio::spawn(async move {
                    let method = request.method.clone();
                    let outcome = session.dispatch_one(request).await;
                    match outcome {
                        Ok(result) => {
                            let _ = writer.write_result(result).await;
                        }
                        Err(err) => {
                            let err: McpError = err;
                            let _ = writer.close_with_error(err.code, err.message, err.data).await;
                        }
                    }
                    debug!(method = %method, "handled inbound request");
                });
            }
        });
    }

    async fn dispatch_one(&self, request: protomcp_types::JsonRpcRequest) -> Result<Value, McpError> {
        let method = Method::parse(&request.method).ok_or_else(|| McpError::method_not_found(&request.method))?;
        match method {
            Method::ToolsList => Ok(serde_json::json!({ "tools": self.mux.list_tools() })),
            Method::ToolsCall => {
                let params = request.params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::invalid_params("missing name"))?;
                let arguments = params.get("arguments").cloned();
                let contents = self.mux.call_tool(name, arguments).await?;
                Ok(marshal_contents(&contents))
            }
            Method::ResourcesList => Ok(serde_json::json!({ "resources": self.mux.list_resources() })),
            Method::ResourcesRead => {
                let params = request.params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                let uri = params
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::invalid_params("missing uri"))?;
                let contents = self.mux.read_resource(uri).await?;
                Ok(marshal_contents(&contents))
            }
            Method::ResourcesSubscribe => {
                let params = request.params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                let uri = params
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::invalid_params("missing uri"))?;
                self.mux.subscribe_resource(uri)?;
                Ok(Value::Null)
            }
            Method::PromptsList => Ok(serde_json::json!({ "prompts": self.mux.list_prompts() })),
            Method::PromptsGet => {
                let params = request.params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::invalid_params("missing name"))?;
                let arguments = params.get("arguments").cloned();
                let messages = self.mux.get_prompt(name, arguments).await?;
                Ok(serde_json::json!({ "messages": messages }))
            }
            Method::LoggingSetLevel => Ok(Value::Null),
            other => Err(McpError::method_not_found(other.as_str())),
        }
    }

    fn spawn_broadcaster(self: Arc<Self>, signal: Arc<tokio::sync::Notify>, method: Method) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = signal.notified() => {
                        if let Err(err) = self.transport.notify(method.as_str(), None).await {
                            warn!(method = %method, error = %err, "failed to push change notification, stopping broadcaster");
                            return;
                        }
                    }
                    () = self.dispatch_cancel.cancelled() => return,
                }
            }
        });
    }
}

impl From<TransportError> for McpError {
    fn from(err: TransportError) -> Self {
        McpError::new(protomcp_types::ErrorCode::McpInternal, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ToolHandler;
    use async_trait::async_trait;
    use protomcp_transport::{StdioTransport, StdioTransportConfig};
    use protomcp_types::{Content, Tool};

    fn pair() -> (StdioTransport, StdioTransport) {
        let (a_read, b_write) = tokio::io::duplex(64 * 1024);
        let (b_read, a_write) = tokio::io::duplex(64 * 1024);
        (
            StdioTransport::from_io(Box::pin(a_read), Box::pin(a_write), StdioTransportConfig::default()),
            StdioTransport::from_io(Box::pin(b_read), Box::pin(b_write), StdioTransportConfig::default()),
        )
    }

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, arguments: Option<Value>) -> Result<Vec<Content>, McpError> {
            Ok(vec![Content::binary("application/json", arguments.unwrap_or(Value::Null))])
        }
    }

    #[tokio::test]
    async fn handshake_rejects_wrong_protocol_version() {
        let (client, server): (StdioTransport, StdioTransport) = pair();
        let client: Arc<dyn Transport> = Arc::new(client);
        let server: Arc<dyn Transport> = Arc::new(server);

        let request = client
            .request(
                "initialize",
                Some(serde_json::json!({"protocolVersion": "bogus", "capabilities": {}, "clientInfo": {"name":"t","version":"0"}})),
            )
            .await
            .unwrap();

        let mux = Arc::new(ServerMux::new());
        let err = ServerSession::accept(server, mux, ServerOptions::default()).await.unwrap_err();
        assert!(matches!(err, ServerError::ProtocolVersionMismatch { .. }));

        assert!(request.wait().await.is_err());
    }

    #[tokio::test]
    async fn handshake_succeeds_and_dispatches_tool_call() {
        let (client, server): (StdioTransport, StdioTransport) = pair();
        let client: Arc<dyn Transport> = Arc::new(client);
        let server: Arc<dyn Transport> = Arc::new(server);

        let version = ProtocolVersion::default_version();
        let init = client
            .request(
                "initialize",
                Some(serde_json::json!({
                    "protocolVersion": version.as_str(),
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "0.1"},
                })),
            )
            .await
            .unwrap();

        let mux = Arc::new(ServerMux::new());
        mux.handle_tool(Tool::new("echo", serde_json::json!({})), Arc::new(Echo));

        let session = ServerSession::accept(server, mux, ServerOptions::default()).await.unwrap();

        let init_result = init.wait().await.unwrap();
        assert_eq!(init_result["protocolVersion"], version.as_str());

        let call = client
            .request("tools/call", Some(serde_json::json!({"name": "echo", "arguments": 7})))
            .await
            .unwrap();
        let result = call.wait().await.unwrap();
        assert_eq!(result["contents"][0]["data"], 7);

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn non_initialize_first_request_fails_handshake() {
        let (client, server): (StdioTransport, StdioTransport) = pair();
        let client: Arc<dyn Transport> = Arc::new(client);
        let server: Arc<dyn Transport> = Arc::new(server);

        let _pending = client.request("tools/list", None).await.unwrap();

        let mux = Arc::new(ServerMux::new());
        let err = ServerSession::accept(server, mux, ServerOptions::default()).await.unwrap_err();
        assert!(matches!(err, ServerError::NotInitializeFirst(ref m) if m == "tools/list"));
    }

    #[test]
    fn capability_composition_keeps_explicit_additional_capabilities() {
        let mut additional = Capabilities::new();
        additional.disable("tools", "listChanged");

        let options = ServerOptions {
            additional_capabilities: additional,
            tools_list_changed: true,
            ..ServerOptions::default()
        };

        let caps = options.capabilities();
        assert!(!caps.has_capability("tools", "listChanged"));
    }

    /// A tool handler that, once the enclosing session is available, calls
    /// back out to the client with `roots/list` from inside its own
    /// `tools/call` dispatch. Exercises the re-entrancy the lock ordering
    /// (writer mutex, then outbound-table mutex, never held across user
    /// code) is meant to allow: the outbound call must not deadlock against
    /// the inbound dispatch that is still in progress.
    struct CallsBackIntoSession {
        session: Arc<tokio::sync::OnceCell<Arc<ServerSession>>>,
    }

    #[async_trait]
    impl crate::handlers::ToolHandler for CallsBackIntoSession {
        async fn call(&self, _arguments: Option<Value>) -> Result<Vec<Content>, McpError> {
            let session = self.session.get().expect("session installed before dispatch begins").clone();
            let roots = session
                .list_roots(&CancellationToken::new())
                .await
                .map_err(|e| McpError::new(protomcp_types::ErrorCode::McpInternal, e.to_string()))?;
            Ok(vec![Content::binary("application/json", serde_json::json!({"rootCount": roots.len()}))])
        }
    }

    #[tokio::test]
    async fn handler_can_issue_outbound_request_while_being_dispatched() {
        let (client, server): (StdioTransport, StdioTransport) = pair();
        let client: Arc<dyn Transport> = Arc::new(client);
        let server: Arc<dyn Transport> = Arc::new(server);

        let version = ProtocolVersion::default_version();
        let init = client
            .request(
                "initialize",
                Some(serde_json::json!({
                    "protocolVersion": version.as_str(),
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "0.1"},
                })),
            )
            .await
            .unwrap();

        let session_cell = Arc::new(tokio::sync::OnceCell::new());
        let mux = Arc::new(ServerMux::new());
        mux.handle_tool(
            Tool::new("ask-roots", serde_json::json!({})),
            Arc::new(CallsBackIntoSession { session: session_cell.clone() }),
        );

        let session = ServerSession::accept(server, mux, ServerOptions::default()).await.unwrap();
        session_cell.set(session.clone()).unwrap();
        init.wait().await.unwrap();

        let call = client.request("tools/call", Some(serde_json::json!({"name": "ask-roots"}))).await.unwrap();

        let cancel = CancellationToken::new();
        let (roots_request, roots_writer) = client.accept_request(&cancel).await.unwrap();
        assert_eq!(roots_request.method, Method::RootsList.as_str());
        roots_writer.write_result(serde_json::json!({"roots": []})).await.unwrap();

        let result = call.wait().await.unwrap();
        assert_eq!(result["contents"][0]["data"]["rootCount"], 0);

        session.close().await.unwrap();
    }
}
