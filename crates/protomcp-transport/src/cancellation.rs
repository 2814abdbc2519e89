//! Cancellation primitive used by every `accept-*`/`request-sync` call.
//!
//! Re-exported rather than reimplemented: `tokio_util::sync::CancellationToken`
//! already gives cheap-to-clone, hierarchical cancellation with a `cancelled()`
//! future that composes cleanly inside `tokio::select!`.
pub use tokio_util::sync::CancellationToken;
