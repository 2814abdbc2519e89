//! HTTP POST + SSE back-channel server transport.
//!
//! One MCP session per `mcp-session-id`. A `POST` with no session header
//! starts a session (its first request is expected to be `initialize`); a
//! `POST` carrying a known session header is routed to that session's
//! correlator; a `GET` carrying a known session header opens the session's
//! SSE back-channel, over which server-initiated requests, notifications,
//! and any reply the server chooses to defer out of its POST handler are
//! pushed.
//!
//! Unlike a no-op `notify`, pushing here is symmetric with server-initiated
//! requests: if nobody is subscribed yet the bytes sit in a small backlog
//! and are flushed to the next GET connection.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use protomcp_protocol::{Frame, Message, decode_frame, encode_message};
use protomcp_types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

use crate::cancellation::CancellationToken;
use crate::config::HttpServerConfig;
use crate::correlation::Correlator;
use crate::error::{TransportError, TransportResult};
use crate::response_writer::ResponseWriter;
use crate::sink::EnvelopeSink;
use crate::transport::{PendingResponse, Transport};

const SESSION_ID_HEADER: &str = "mcp-session-id";
/// Backlog cap per session before the oldest queued push is dropped.
const BACKLOG_CAPACITY: usize = 256;

/// Opaque session identifier, stamped on the `mcp-session-id` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The SSE back-channel for one session: a broadcast sender for live
/// subscribers plus a small backlog for pushes that arrive before any `GET`
/// has connected.
#[derive(Debug)]
struct SseChannel {
    tx: broadcast::Sender<Vec<u8>>,
    backlog: SyncMutex<VecDeque<Vec<u8>>>,
}

impl SseChannel {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            tx,
            backlog: SyncMutex::new(VecDeque::new()),
        }
    }

    fn push(&self, bytes: Vec<u8>) {
        if self.tx.send(bytes.clone()).is_err() {
            let mut backlog = self.backlog.lock();
            if backlog.len() >= BACKLOG_CAPACITY {
                backlog.pop_front();
                warn!("SSE backlog full, dropping oldest queued push");
            }
            backlog.push_back(bytes);
        }
    }

    /// Subscribe, returning the live receiver and whatever had queued up
    /// while nobody was listening.
    fn subscribe(&self) -> (broadcast::Receiver<Vec<u8>>, Vec<Vec<u8>>) {
        let backlog = self.backlog.lock();
        let rx = self.tx.subscribe();
        (rx, backlog.iter().cloned().collect())
    }
}

#[derive(Debug)]
struct SseSink {
    channel: Arc<SseChannel>,
}

#[async_trait]
impl EnvelopeSink for SseSink {
    async fn send(&self, bytes: Vec<u8>) -> TransportResult<()> {
        self.channel.push(bytes);
        Ok(())
    }
}

/// Replies to exactly the `POST` that carried the request; used as the
/// [`ResponseWriter`]'s sink for client-initiated requests so the answer
/// comes back inline in the HTTP response whenever possible.
#[derive(Debug)]
struct OneshotSink {
    tx: SyncMutex<Option<oneshot::Sender<Vec<u8>>>>,
}

#[async_trait]
impl EnvelopeSink for OneshotSink {
    async fn send(&self, bytes: Vec<u8>) -> TransportResult<()> {
        match self.tx.lock().take() {
            Some(tx) => {
                let _ = tx.send(bytes);
                Ok(())
            }
            None => Err(TransportError::AlreadyReplied),
        }
    }
}

/// One session's transport: a correlator plus its SSE back-channel.
#[derive(Debug)]
pub struct HttpServerTransport {
    correlator: Arc<Correlator>,
    sse: Arc<SseChannel>,
    closed: AtomicBool,
}

impl HttpServerTransport {
    fn new() -> Self {
        Self {
            correlator: Arc::new(Correlator::new()),
            sse: Arc::new(SseChannel::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn sse_sink(&self) -> Arc<dyn EnvelopeSink> {
        Arc::new(SseSink { channel: self.sse.clone() })
    }

    /// Route one decoded inbound message. Requests get a reply sink that
    /// first tries the originating POST's oneshot (`post_reply`); if that
    /// slot is unused by the time the handler answers, nothing is lost,
    /// since the POST handler also falls back to the SSE channel for any
    /// request it doesn't wait out.
    fn route_inbound(&self, msg: Message, post_reply: Option<oneshot::Sender<Vec<u8>>>) {
        match msg {
            Message::Request(req) => {
                let sink: Arc<dyn EnvelopeSink> = match post_reply {
                    Some(tx) => Arc::new(OneshotSink { tx: SyncMutex::new(Some(tx)) }),
                    None => self.sse_sink(),
                };
                let _ = self.correlator.dispatch_request(req, sink);
            }
            Message::Notification(notif) => self.correlator.dispatch_notification(notif),
            Message::Response(resp) => self.correlator.dispatch_response(resp),
        }
    }
}

#[async_trait]
impl Transport for HttpServerTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> TransportResult<PendingResponse> {
        let id = self.correlator.next_id();
        let rx = self.correlator.register_outbound(id.clone());
        let req = JsonRpcRequest::new(id.clone(), method, params);
        if let Err(e) = self.sse_sink().send(encode_message(&Message::Request(req))?).await {
            self.correlator.fail_outbound(&id, e.clone());
            return Err(e);
        }
        Ok(PendingResponse::new(rx))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> TransportResult<()> {
        let notif = JsonRpcNotification::new(method, params);
        self.sse_sink().send(encode_message(&Message::Notification(notif))?).await
    }

    async fn accept_request(
        &self,
        cancel: &CancellationToken,
    ) -> TransportResult<(JsonRpcRequest, ResponseWriter)> {
        self.correlator.accept_request(cancel).await
    }

    async fn accept_notification(&self, cancel: &CancellationToken) -> TransportResult<JsonRpcNotification> {
        self.correlator.accept_notification(cancel).await
    }

    async fn close_with_error(&self, err: TransportError) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.correlator.close(&err.to_string());
        Ok(())
    }
}

/// Shared, lock-protected map from session ID to that session's transport.
#[derive(Clone, Debug)]
pub struct SharedSessionRegistry {
    inner: Arc<SyncMutex<HashMap<SessionId, Arc<HttpServerTransport>>>>,
}

impl Default for SharedSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SyncMutex::new(HashMap::new())),
        }
    }

    fn create(&self) -> (SessionId, Arc<HttpServerTransport>) {
        let id = SessionId::generate();
        let transport = Arc::new(HttpServerTransport::new());
        self.inner.lock().insert(id.clone(), transport.clone());
        debug!(session_id = %id, "created http session");
        (id, transport)
    }

    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Arc<HttpServerTransport>> {
        self.inner.lock().get(id).cloned()
    }

    pub fn remove(&self, id: &SessionId) {
        self.inner.lock().remove(id);
        debug!(session_id = %id, "removed http session");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
struct ServerState {
    registry: SharedSessionRegistry,
    config: HttpServerConfig,
}

/// Build the two-route Axum router (`POST`/`GET` on the same path) backed
/// by `registry`. The caller mounts this under whatever path it likes.
#[must_use]
pub fn router(registry: SharedSessionRegistry, config: HttpServerConfig) -> Router {
    let state = ServerState { registry, config };
    Router::new()
        .route("/", post(handle_post).get(handle_sse))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_header(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| SessionId::from(s.to_string()))
}

async fn handle_post(State(state): State<ServerState>, headers: HeaderMap, body: Bytes) -> Response {
    if body.len() > state.config.max_message_size {
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let (session_id, session) = match session_header(&headers) {
        Some(id) => match state.registry.get(&id) {
            Some(session) => (id, session),
            None => return (StatusCode::NOT_FOUND, "unknown mcp-session-id").into_response(),
        },
        None => state.registry.create(),
    };

    let frame = match decode_frame(&body) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "rejecting malformed POST body");
            let resp = JsonRpcResponse::parse_error(e.to_string());
            return with_session_header(
                (StatusCode::BAD_REQUEST, axum::Json(resp)).into_response(),
                &session_id,
            );
        }
    };

    let messages = match frame {
        Frame::Single(msg) => vec![msg],
        Frame::Batch(msgs) => msgs,
    };

    let mut waiters = Vec::new();
    for msg in messages {
        match msg {
            Message::Request(req) => {
                let (tx, rx) = oneshot::channel();
                session.route_inbound(Message::Request(req), Some(tx));
                waiters.push(rx);
            }
            other => session.route_inbound(other, None),
        }
    }

    if waiters.is_empty() {
        return with_session_header(StatusCode::ACCEPTED.into_response(), &session_id);
    }

    let replies = futures::future::join_all(waiters).await;
    let mut bodies = Vec::with_capacity(replies.len());
    for reply in replies {
        match reply {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(v) => bodies.push(v),
                Err(e) => warn!(error = %e, "dropping unparseable reply body"),
            },
            Err(_) => warn!("reply sender dropped before answering a POST-originated request"),
        }
    }

    let payload = if bodies.len() == 1 {
        bodies.into_iter().next().unwrap()
    } else {
        Value::Array(bodies)
    };

    with_session_header(
        ([(CONTENT_TYPE, "application/json")], axum::Json(payload)).into_response(),
        &session_id,
    )
}

fn with_session_header(mut response: Response, session_id: &SessionId) -> Response {
    if let Ok(value) = axum::http::HeaderValue::from_str(session_id.as_str()) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    response
}

async fn handle_sse(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_header(&headers) else {
        return (StatusCode::BAD_REQUEST, "missing mcp-session-id").into_response();
    };
    let Some(session) = state.registry.get(&session_id) else {
        return (StatusCode::NOT_FOUND, "unknown mcp-session-id").into_response();
    };

    let (rx, backlog) = session.sse.subscribe();
    let keep_alive = state.config.sse_keep_alive;

    let stream = futures::stream::unfold(
        (rx, backlog.into_iter().collect::<VecDeque<_>>()),
        move |(mut rx, mut backlog)| async move {
            if let Some(bytes) = backlog.pop_front() {
                let event = Event::default().data(String::from_utf8_lossy(&bytes).into_owned());
                return Some((Ok::<_, Infallible>(event), (rx, backlog)));
            }
            loop {
                match rx.recv().await {
                    Ok(bytes) => {
                        let event = Event::default().data(String::from_utf8_lossy(&bytes).into_owned());
                        return Some((Ok(event), (rx, backlog)));
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "SSE subscriber lagged, missed pushes");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    );

    let sse = Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive).text("keep-alive"));
    with_session_header(sse.into_response(), &session_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_channel_backlogs_until_subscribed() {
        let channel = SseChannel::new();
        channel.push(b"one".to_vec());
        channel.push(b"two".to_vec());

        let (_, backlog) = channel.subscribe();
        assert_eq!(backlog, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn sse_channel_prefers_live_subscriber_over_backlog() {
        let channel = SseChannel::new();
        let (mut rx, backlog) = channel.subscribe();
        assert!(backlog.is_empty());

        channel.push(b"live".to_vec());
        let received = rx.try_recv().unwrap();
        assert_eq!(received, b"live".to_vec());
    }

    #[test]
    fn registry_round_trips_sessions() {
        let registry = SharedSessionRegistry::new();
        let (id, transport) = registry.create();
        assert!(registry.get(&id).is_some());
        assert!(Arc::ptr_eq(&registry.get(&id).unwrap(), &transport));

        registry.remove(&id);
        assert!(registry.get(&id).is_none());
    }

    #[tokio::test]
    async fn duplicate_inbound_id_is_dropped_within_a_session() {
        let registry = SharedSessionRegistry::new();
        let (_, session) = registry.create();
        let req = JsonRpcRequest::new("1", "tools/list", None);

        let (tx1, _rx1) = oneshot::channel();
        session.route_inbound(Message::Request(req.clone()), Some(tx1));
        let (tx2, _rx2) = oneshot::channel();
        session.route_inbound(Message::Request(req), Some(tx2));

        let cancel = CancellationToken::new();
        let (first, _writer) = session.accept_request(&cancel).await.unwrap();
        assert_eq!(first.id.to_string(), "1");

        let second = tokio::time::timeout(std::time::Duration::from_millis(50), session.accept_request(&cancel)).await;
        assert!(second.is_err());
    }
}
