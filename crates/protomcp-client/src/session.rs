//! `ClientSession`: one dialed peer connection, past the `initialize`
//! handshake, exposing the server's tools/resources/prompts and answering
//! the server's sampling/roots callbacks via a [`ClientMux`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use protomcp_transport::{CancellationToken, Transport, TransportError};
use protomcp_types::{
    Capabilities, Content, Implementation, McpError, Method, Prompt, PromptMessage,
    ProtocolVersion, Resource, Tool, unmarshal_contents,
};

use crate::error::{ClientError, ClientResult};
use crate::mux::ClientMux;

/// Client-supplied configuration for the `initialize` handshake. The
/// booleans feed capability composition, mirroring [`protomcp_server::ServerOptions`]
/// on the other side of the connection.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub protocol_version: ProtocolVersion,
    pub client_info: Implementation,
    pub roots_list_changed: bool,
    pub sampling: bool,
    pub additional_capabilities: Capabilities,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::default_version(),
            client_info: Implementation::new("protomcp-client", env!("CARGO_PKG_VERSION")),
            roots_list_changed: true,
            sampling: true,
            additional_capabilities: Capabilities::new(),
        }
    }
}

impl ClientOptions {
    fn capabilities(&self) -> Capabilities {
        let mut defaults = Capabilities::new();
        if self.roots_list_changed {
            defaults.enable("roots", "listChanged");
        } else {
            defaults.disable("roots", "listChanged");
        }
        if self.sampling {
            defaults.enable("sampling", "enabled");
        }
        self.additional_capabilities.clone().merge(defaults)
    }
}

/// One notification forwarded to a live [`ResourceSubscription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUpdate {
    pub uri: String,
}

/// The stream a caller reads from after [`ClientSession::subscribe_resource`]
/// succeeds. Closed automatically when the session closes.
pub struct ResourceSubscription {
    uri: String,
    rx: mpsc::UnboundedReceiver<ResourceUpdate>,
}

impl ResourceSubscription {
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Await the next `resources/updated` notification for this URI, or
    /// `None` once the session has closed.
    pub async fn next(&mut self) -> Option<ResourceUpdate> {
        self.rx.recv().await
    }
}

/// One dialed peer connection.
pub struct ClientSession {
    transport: Arc<dyn Transport>,
    mux: Arc<ClientMux>,
    server_capabilities: SyncMutex<Capabilities>,
    server_info: SyncMutex<Implementation>,
    dispatch_cancel: CancellationToken,
    subscriptions: tokio::sync::Mutex<HashMap<String, mpsc::UnboundedSender<ResourceUpdate>>>,
}

impl ClientSession {
    /// Perform the `initialize` handshake over `transport` and, on success,
    /// start the background inbound-dispatch task and the roots
    /// change-broadcaster.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ProtocolVersionMismatch`] if the server
    /// replies with a `protocolVersion` other than the one requested.
    pub async fn dial(transport: Arc<dyn Transport>, mux: Arc<ClientMux>, options: ClientOptions) -> ClientResult<Arc<Self>> {
        let handshake_cancel = CancellationToken::new();

        let params = serde_json::json!({
            "protocolVersion": options.protocol_version.as_str(),
            "capabilities": options.capabilities(),
            "clientInfo": options.client_info,
        });

        let result = transport.request_sync(&handshake_cancel, Method::Initialize.as_str(), Some(params)).await?;

        let actual_version = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::MalformedHandshake("protocolVersion missing".into()))?
            .to_string();

        if actual_version != options.protocol_version.as_str() {
            return Err(ClientError::ProtocolVersionMismatch {
                requested: options.protocol_version.as_str().to_string(),
                actual: actual_version,
            });
        }

        let server_capabilities: Capabilities = match result.get("capabilities") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ClientError::MalformedHandshake(format!("capabilities: {e}")))?,
            None => Capabilities::new(),
        };

        let server_info: Implementation = match result.get("serverInfo") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ClientError::MalformedHandshake(format!("serverInfo: {e}")))?,
            None => Implementation::new("unknown", "0.0.0"),
        };

        let session = Arc::new(Self {
            transport,
            mux,
            server_capabilities: SyncMutex::new(server_capabilities),
            server_info: SyncMutex::new(server_info),
            dispatch_cancel: handshake_cancel,
            subscriptions: tokio::sync::Mutex::new(HashMap::new()),
        });

        session.clone().spawn_dispatch_loop();
        session.clone().spawn_notification_loop();
        session.clone().spawn_broadcaster(session.mux.roots_change_signal(), Method::NotifyRootsListChanged);

        Ok(session)
    }

    #[must_use]
    pub fn server_capabilities(&self) -> Capabilities {
        self.server_capabilities.lock().clone()
    }

    #[must_use]
    pub fn server_info(&self) -> Implementation {
        self.server_info.lock().clone()
    }

    #[must_use]
    pub fn mux(&self) -> &Arc<ClientMux> {
        &self.mux
    }

    pub async fn list_tools(&self, cancel: &CancellationToken) -> ClientResult<Vec<Tool>> {
        let result = self.transport.request_sync(cancel, Method::ToolsList.as_str(), None).await?;
        Ok(serde_json::from_value(
            result.get("tools").cloned().ok_or_else(|| McpError::parse_error("missing tools"))?,
        )
        .map_err(McpError::parse_error)?)
    }

    pub async fn call_tool(&self, cancel: &CancellationToken, name: &str, arguments: Option<Value>) -> ClientResult<Vec<Content>> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let result = self.transport.request_sync(cancel, Method::ToolsCall.as_str(), Some(params)).await?;
        unmarshal_contents(&result).map_err(|e| ClientError::Mcp(McpError::parse_error(e)))
    }

    pub async fn list_resources(&self, cancel: &CancellationToken) -> ClientResult<Vec<Resource>> {
        let result = self.transport.request_sync(cancel, Method::ResourcesList.as_str(), None).await?;
        Ok(serde_json::from_value(
            result.get("resources").cloned().ok_or_else(|| McpError::parse_error("missing resources"))?,
        )
        .map_err(McpError::parse_error)?)
    }

    pub async fn read_resource(&self, cancel: &CancellationToken, uri: &str) -> ClientResult<Vec<Content>> {
        let params = serde_json::json!({ "uri": uri });
        let result = self.transport.request_sync(cancel, Method::ResourcesRead.as_str(), Some(params)).await?;
        unmarshal_contents(&result).map_err(|e| ClientError::Mcp(McpError::parse_error(e)))
    }

    /// Subscribe to `notifications/resources/updated` for `uri`. Installs
    /// the forwarding channel only once the server confirms the
    /// subscription; on failure, nothing is installed.
    pub async fn subscribe_resource(&self, cancel: &CancellationToken, uri: &str) -> ClientResult<ResourceSubscription> {
        let params = serde_json::json!({ "uri": uri });
        self.transport.request_sync(cancel, Method::ResourcesSubscribe.as_str(), Some(params)).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions.lock().await.insert(uri.to_string(), tx);
        Ok(ResourceSubscription { uri: uri.to_string(), rx })
    }

    pub async fn list_prompts(&self, cancel: &CancellationToken) -> ClientResult<Vec<Prompt>> {
        let result = self.transport.request_sync(cancel, Method::PromptsList.as_str(), None).await?;
        Ok(serde_json::from_value(
            result.get("prompts").cloned().ok_or_else(|| McpError::parse_error("missing prompts"))?,
        )
        .map_err(McpError::parse_error)?)
    }

    pub async fn get_prompt(&self, cancel: &CancellationToken, name: &str, arguments: Option<Value>) -> ClientResult<Vec<PromptMessage>> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let result = self.transport.request_sync(cancel, Method::PromptsGet.as_str(), Some(params)).await?;
        let messages = result.get("messages").cloned().ok_or_else(|| McpError::parse_error("missing messages"))?;
        Ok(serde_json::from_value(messages).map_err(McpError::parse_error)?)
    }

    /// Cancel the dispatch loop and close the transport. Idempotent.
    pub async fn close(&self) -> ClientResult<()> {
        self.dispatch_cancel.cancel();
        self.transport.close().await?;
        self.subscriptions.lock().await.clear();
        Ok(())
    }

    /// At minimum equivalent to [`ClientSession::close`]; reserved for a
    /// future orderly shutdown exchange.
    pub async fn shutdown(&self) -> ClientResult<()> {
        self.close().await
    }

    fn spawn_dispatch_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let (request, writer) = match self.transport.accept_request(&self.dispatch_cancel).await {
                    Ok(pair) => pair,
                    Err(_) => {
                        debug!("client dispatch loop exiting: transport closed or cancelled");
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
                    debug!(method = %method, "handled server-initiated request");
                });
            }
        });
    }

    async fn dispatch_one(&self, request: protomcp_types::JsonRpcRequest) -> Result<Value, McpError> {
        let method = Method::parse(&request.method).ok_or_else(|| McpError::method_not_found(&request.method))?;
        match method {
            Method::RootsList => Ok(serde_json::json!({ "roots": self.mux.list_roots() })),
            Method::SamplingCreateMessage => {
                let message = self.mux.sample(request.params).await?;
                serde_json::to_value(message).map_err(McpError::parse_error)
            }
            other => Err(McpError::method_not_found(other.as_str())),
        }
    }

    fn spawn_notification_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let notification = match self.transport.accept_notification(&self.dispatch_cancel).await {
                    Ok(n) => n,
                    Err(_) => {
                        debug!("client notification loop exiting: transport closed or cancelled");
                        return;
                    }
                };
                match Method::parse(&notification.method) {
                    Some(Method::NotifyResourcesUpdated) => {
                        let Some(uri) = notification.params.as_ref().and_then(|p| p.get("uri")).and_then(Value::as_str) else {
                            warn!("dropping resources/updated notification missing uri");
                            continue;
                        };
                        let subs = self.subscriptions.lock().await;
                        if let Some(tx) = subs.get(uri) {
                            let _ = tx.send(ResourceUpdate { uri: uri.to_string() });
                        }
                    }
                    Some(other) => debug!(method = %other, "received change notification"),
                    None => debug!(method = %notification.method, "received unrecognized notification"),
                }
            }
        });
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
    use async_trait::async_trait;
    use protomcp_transport::{StdioTransport, StdioTransportConfig};
    use protomcp_types::{Root, SamplingMessage};

    use crate::handlers::SampleHandler;

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
    impl SampleHandler for Echo {
        async fn sample(&self, _params: Option<Value>) -> Result<SamplingMessage, McpError> {
            Ok(SamplingMessage {
                role: "assistant".into(),
                content: Content::binary("text/plain", "hi"),
                model: None,
                stop_reason: None,
            })
        }
    }

    #[tokio::test]
    async fn handshake_rejects_wrong_protocol_version() {
        let (client, server): (StdioTransport, StdioTransport) = pair();
        let client: Arc<dyn Transport> = Arc::new(client);
        let server: Arc<dyn Transport> = Arc::new(server);

        let server_task = tokio::spawn(async move {
            let (req, writer) = server.accept_request(&CancellationToken::new()).await.unwrap();
            assert_eq!(req.method, "initialize");
            writer
                .write_result(serde_json::json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "serverInfo": {"name": "s", "version": "0"},
                }))
                .await
                .unwrap();
        });

        let mux = Arc::new(ClientMux::new());
        let err = ClientSession::dial(client, mux, ClientOptions::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::ProtocolVersionMismatch { .. }));

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_succeeds_and_serves_sampling_callback() {
        let (client, server): (StdioTransport, StdioTransport) = pair();
        let client: Arc<dyn Transport> = Arc::new(client);
        let server: Arc<dyn Transport> = Arc::new(server);

        let version = ProtocolVersion::default_version();
        let server_clone = server.clone();
        let handshake = tokio::spawn(async move {
            let (req, writer) = server_clone.accept_request(&CancellationToken::new()).await.unwrap();
            assert_eq!(req.method, "initialize");
            writer
                .write_result(serde_json::json!({
                    "protocolVersion": version.as_str(),
                    "capabilities": {"sampling": {"enabled": true}},
                    "serverInfo": {"name": "s", "version": "0.0.1"},
                }))
                .await
                .unwrap();
        });

        let mux = Arc::new(ClientMux::new());
        mux.register_root(Root::new("file:///root"));
        mux.set_sample_handler(Arc::new(Echo));

        let session = ClientSession::dial(client, mux, ClientOptions::default()).await.unwrap();
        handshake.await.unwrap();

        assert_eq!(session.server_info().name, "s");
        assert!(session.server_capabilities().has_capability("sampling", "enabled"));

        let sample_call = server
            .request("sampling/createMessage", Some(serde_json::json!({"maxTokens": 10})))
            .await
            .unwrap();
        let result = sample_call.wait().await.unwrap();
        assert_eq!(result["role"], "assistant");

        session.close().await.unwrap();
    }
}
