//! HTTP POST + SSE back-channel client transport.
//!
//! Outbound requests go out as `POST` with `Content-Type: application/json`
//! and `Accept: application/json, text/event-stream` — the server may reply
//! inline (`application/json` body) or defer the reply to the SSE
//! back-channel (`text/event-stream` body, or a later push on the long-lived
//! GET connection). Both paths resolve through the same [`Correlator`], so
//! callers never notice which one the server chose.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, error, warn};

use protomcp_protocol::{Frame, Message, decode_frame, encode_message};
use protomcp_types::{JsonRpcNotification, JsonRpcRequest};

use crate::cancellation::CancellationToken;
use crate::config::HttpClientConfig;
use crate::correlation::Correlator;
use crate::error::{TransportError, TransportResult};
use crate::response_writer::ResponseWriter;
use crate::sink::EnvelopeSink;
use crate::transport::{PendingResponse, Transport};

const SESSION_ID_HEADER: &str = "mcp-session-id";

#[derive(Debug)]
struct HttpPostSink {
    http: reqwest::Client,
    base_url: String,
    session_id: Arc<SyncMutex<Option<String>>>,
}

#[async_trait]
impl EnvelopeSink for HttpPostSink {
    async fn send(&self, bytes: Vec<u8>) -> TransportResult<()> {
        let mut req = self
            .http
            .post(&self.base_url)
            .header(CONTENT_TYPE, "application/json")
            .body(bytes);
        if let Some(id) = self.session_id.lock().clone() {
            req = req.header(SESSION_ID_HEADER, id);
        }
        let resp = req.send().await.map_err(|e| TransportError::Io(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus { status, body });
        }
        Ok(())
    }
}

/// HTTP client transport with an SSE back-channel.
#[derive(Debug)]
pub struct HttpClientTransport {
    correlator: Arc<Correlator>,
    http: reqwest::Client,
    config: HttpClientConfig,
    session_id: Arc<SyncMutex<Option<String>>>,
    reply_sink: Arc<HttpPostSink>,
    sse_task: SyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl HttpClientTransport {
    /// Build a new transport. The SSE back-channel is not opened until
    /// [`HttpClientTransport::connect_backchannel`] is called — typically
    /// right after the `initialize` handshake, once a session ID (if any)
    /// is known.
    #[must_use]
    pub fn new(config: HttpClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let session_id = Arc::new(SyncMutex::new(config.session_id.clone()));
        let reply_sink = Arc::new(HttpPostSink {
            http: http.clone(),
            base_url: config.base_url.clone(),
            session_id: session_id.clone(),
        });

        Self {
            correlator: Arc::new(Correlator::new()),
            http,
            config,
            session_id,
            reply_sink,
            sse_task: SyncMutex::new(None),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    pub fn set_session_id(&self, id: impl Into<String>) {
        *self.session_id.lock() = Some(id.into());
    }

    fn extra_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in &self.config.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                headers.insert(name, value);
            }
        }
        headers
    }

    /// Open the long-lived GET/SSE back-channel that carries server-to-client
    /// requests and notifications.
    pub fn connect_backchannel(&self) {
        let http = self.http.clone();
        let url = self.config.base_url.clone();
        let session_id = self.session_id.clone();
        let correlator = self.correlator.clone();
        let reply_sink = self.reply_sink.clone() as Arc<dyn EnvelopeSink>;
        let extra = self.extra_headers();

        let task = tokio::spawn(async move {
            let mut req = http.get(&url).header(ACCEPT, "text/event-stream").headers(extra);
            if let Some(id) = session_id.lock().clone() {
                req = req.header(SESSION_ID_HEADER, id);
            }
            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    error!(error = %e, "failed to open SSE back-channel");
                    correlator.close(&e.to_string());
                    return;
                }
            };
            if let Err(e) = drain_sse_stream(resp, &correlator, &reply_sink).await {
                error!(error = %e, "SSE back-channel ended with error");
                correlator.close(&e.to_string());
            }
        });

        *self.sse_task.lock() = Some(task);
    }

    async fn send_request(&self, req: JsonRpcRequest) -> TransportResult<()> {
        let mut request = self
            .http
            .post(&self.config.base_url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .headers(self.extra_headers())
            .body(encode_message(&Message::Request(req.clone()))?);
        if let Some(id) = self.session_id.lock().clone() {
            request = request.header(SESSION_ID_HEADER, id);
        }

        let resp = request.send().await.map_err(|e| TransportError::Io(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus { status, body });
        }

        if let Some(id) = resp.headers().get(SESSION_ID_HEADER).and_then(|v| v.to_str().ok()) {
            self.set_session_id(id.to_string());
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();

        if content_type.starts_with("text/event-stream") {
            let reply_sink = self.reply_sink.clone() as Arc<dyn EnvelopeSink>;
            drain_sse_stream(resp, &self.correlator, &reply_sink).await?;
        } else {
            let bytes = resp.bytes().await.map_err(|e| TransportError::Io(e.to_string()))?;
            match decode_frame(&bytes)? {
                Frame::Single(Message::Response(resp_msg)) => self.correlator.dispatch_response(resp_msg),
                Frame::Single(other) => {
                    warn!(?other, "expected a response in POST body, got something else");
                }
                Frame::Batch(msgs) => {
                    for msg in msgs {
                        route_message(&self.correlator, &(self.reply_sink.clone() as Arc<dyn EnvelopeSink>), msg);
                    }
                }
            }
        }
        Ok(())
    }
}

async fn drain_sse_stream(
    resp: reqwest::Response,
    correlator: &Arc<Correlator>,
    reply_sink: &Arc<dyn EnvelopeSink>,
) -> TransportResult<()> {
    use futures::StreamExt;
    let mut stream = resp.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransportError::Io(e.to_string()))?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(boundary) = buffer.find("\n\n") {
            let event: String = buffer.drain(..boundary + 2).collect();
            let payload: String = event
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("");
            if payload.is_empty() {
                continue;
            }
            match decode_frame(payload.as_bytes()) {
                Ok(Frame::Single(msg)) => route_message(correlator, reply_sink, msg),
                Ok(Frame::Batch(msgs)) => {
                    for msg in msgs {
                        route_message(correlator, reply_sink, msg);
                    }
                }
                Err(e) => warn!(error = %e, "dropping malformed SSE frame"),
            }
        }
    }
    debug!("SSE stream ended");
    Ok(())
}

fn route_message(correlator: &Arc<Correlator>, reply_sink: &Arc<dyn EnvelopeSink>, msg: Message) {
    match msg {
        Message::Response(resp) => correlator.dispatch_response(resp),
        Message::Request(req) => {
            let _ = correlator.dispatch_request(req, reply_sink.clone());
        }
        Message::Notification(notif) => correlator.dispatch_notification(notif),
    }
}

#[async_trait]
impl Transport for HttpClientTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> TransportResult<PendingResponse> {
        let id = self.correlator.next_id();
        let rx = self.correlator.register_outbound(id.clone());
        let req = JsonRpcRequest::new(id.clone(), method, params);
        if let Err(e) = self.send_request(req).await {
            self.correlator.fail_outbound(&id, e.clone());
            return Err(e);
        }
        Ok(PendingResponse::new(rx))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> TransportResult<()> {
        let notif = JsonRpcNotification::new(method, params);
        (self.reply_sink.clone() as Arc<dyn EnvelopeSink>)
            .send(encode_message(&Message::Notification(notif))?)
            .await
    }

    async fn accept_request(
        &self,
        cancel: &CancellationToken,
    ) -> TransportResult<(JsonRpcRequest, ResponseWriter)> {
        self.correlator.accept_request(cancel).await
    }

    async fn accept_notification(&self, cancel: &CancellationToken) -> TransportResult<protomcp_types::JsonRpcNotification> {
        self.correlator.accept_notification(cancel).await
    }

    async fn close_with_error(&self, err: TransportError) -> TransportResult<()> {
        self.correlator.close(&err.to_string());
        if let Some(task) = self.sse_task.lock().take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_localhost() {
        let config = HttpClientConfig::default();
        assert!(config.base_url.starts_with("http://"));
    }
}
