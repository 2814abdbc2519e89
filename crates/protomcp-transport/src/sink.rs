//! The write side of a transport, abstracted so the correlation core and
//! response writers don't need to know whether bytes end up on a pipe, an
//! HTTP response body, or an SSE stream.

use async_trait::async_trait;

use crate::error::TransportResult;

/// Something that can accept one framed envelope's worth of bytes.
///
/// Implementations are responsible for their own internal serialization
/// (e.g. a mutex around a writer) so concurrent `send` calls never
/// interleave bytes of distinct envelopes.
#[async_trait]
pub trait EnvelopeSink: Send + Sync + std::fmt::Debug {
    async fn send(&self, bytes: Vec<u8>) -> TransportResult<()>;
}
