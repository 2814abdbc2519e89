//! Per-transport configuration, following a `StreamableHttpClientConfig`-style
//! layering convention: typed knobs with sensible defaults per adapter.

use std::collections::HashMap;
use std::time::Duration;

/// Auto-reconnect policy for the HTTP client's SSE back-channel.
#[derive(Clone, Debug)]
pub enum RetryPolicy {
    Fixed {
        interval: Duration,
        max_attempts: Option<u32>,
    },
    Exponential {
        base: Duration,
        max_delay: Duration,
        max_attempts: Option<u32>,
    },
    Never,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            max_attempts: Some(10),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Fixed { interval, max_attempts } => {
                if max_attempts.is_some_and(|max| attempt >= max) {
                    return None;
                }
                Some(*interval)
            }
            Self::Exponential { base, max_delay, max_attempts } => {
                if max_attempts.is_some_and(|max| attempt >= max) {
                    return None;
                }
                let millis = base.as_millis().saturating_mul(1u128 << attempt.min(20));
                Some(Duration::from_millis(millis.min(max_delay.as_millis()) as u64))
            }
            Self::Never => None,
        }
    }
}

/// Configuration for [`crate::StdioTransport`].
#[derive(Clone, Debug)]
pub struct StdioTransportConfig {
    /// Maximum framed message size this transport will accept.
    pub max_message_size: usize,
}

impl Default for StdioTransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

/// Configuration for [`crate::HttpClientTransport`].
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub headers: HashMap<String, String>,
    pub protocol_version: String,
    pub session_id: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/mcp".to_string(),
            timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            headers: HashMap::new(),
            protocol_version: protomcp_types::ProtocolVersion::default_version().to_string(),
            session_id: None,
        }
    }
}

/// Configuration accepted by the Axum router built around
/// [`crate::HttpServerTransport`].
#[derive(Clone, Debug)]
pub struct HttpServerConfig {
    pub max_message_size: usize,
    pub sse_keep_alive: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            max_message_size: 16 * 1024 * 1024,
            sse_keep_alive: Duration::from_secs(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = RetryPolicy::Exponential {
            base: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            max_attempts: Some(5),
        };
        assert!(policy.delay(10).unwrap() <= Duration::from_secs(1));
        assert!(policy.delay(100).is_none());
    }
}
