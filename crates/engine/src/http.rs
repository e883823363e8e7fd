//! HTTP integration contract.
//!
//! The concrete transport (a wrapped `reqwest` client or anything else) is
//! out of scope for this crate; only the seam the engine installs itself
//! into is defined here. A host implements [`HttpClientHandle`] once over
//! its real client and hands it to [`crate::engine::Engine::attach`], which
//! registers the engine as an [`HttpInterceptor`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EngineError;

/// Header name the engine checks to decide whether a request is an SSE
/// request.
pub const SSE_ACCEPT_HEADER: &str = "Accept";
/// Header value identifying an SSE request.
pub const SSE_ACCEPT_VALUE: &str = "text/event-stream";
/// Extra-map key carrying an offline provider, short-circuiting the real transport.
pub const OFFLINE_PROVIDER_KEY: &str = "offlineProvider";

/// A request about to be issued by the host's HTTP client.
#[derive(Debug, Clone, Default)]
pub struct EngineRequest {
    /// Request path, used for `unCheckConnectStatePaths` matching.
    pub path: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Free-form extra data a caller may attach to a request, e.g. `offlineProvider`.
    pub extra: HashMap<String, Value>,
}

impl EngineRequest {
    /// Construct a request for `path` with no headers or extras.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            headers: HashMap::new(),
            extra: HashMap::new(),
        }
    }

    /// Whether this request declares itself an SSE stream via the `Accept` header.
    #[must_use]
    pub fn is_sse(&self) -> bool {
        self.headers
            .get(SSE_ACCEPT_HEADER)
            .is_some_and(|v| v == SSE_ACCEPT_VALUE)
    }

    /// The offline provider attached to this request, if any.
    #[must_use]
    pub fn offline_provider(&self) -> Option<&Value> {
        self.extra.get(OFFLINE_PROVIDER_KEY)
    }
}

/// A response received by the host's HTTP client.
#[derive(Debug, Clone, Default)]
pub struct EngineResponse {
    /// HTTP status code.
    pub status: u16,
    /// Whether the request that produced this response was an SSE request.
    pub is_sse: bool,
}

/// Installed on a [`HttpClientHandle`] to observe every request/response/error.
///
/// Mirrors the request/response/error interceptor hooks described for
/// `Engine::init`: request hooks may reject a request outright (e.g. a
/// second primary stream while one is already transforming), response
/// hooks kick off stream consumption, and error hooks drive the
/// connection-state machine.
#[async_trait]
pub trait HttpInterceptor: Send + Sync {
    /// Called before a request is issued. Returning `Err` aborts the request.
    async fn on_request(&self, request: &mut EngineRequest) -> Result<(), EngineError>;

    /// Called once a response's headers/status are known.
    async fn on_response(&self, request: &EngineRequest, response: &EngineResponse);

    /// Called when the transport reports a failure for `request`.
    async fn on_error(&self, request: &EngineRequest, error: &EngineError);
}

/// The minimal surface a host's real HTTP client exposes so the engine can
/// install itself without depending on a concrete transport.
pub trait HttpClientHandle: Send + Sync {
    /// Register `interceptor` to observe this client's requests.
    fn install_interceptor(&self, interceptor: Arc<dyn HttpInterceptor>);

    /// Remove the interceptor most recently installed under `name`.
    fn remove_interceptor(&self, name: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_sse_matches_accept_header_exactly() {
        let mut request = EngineRequest::new("/v1/stream");
        assert!(!request.is_sse());
        request
            .headers
            .insert(SSE_ACCEPT_HEADER.to_string(), SSE_ACCEPT_VALUE.to_string());
        assert!(request.is_sse());
        request
            .headers
            .insert(SSE_ACCEPT_HEADER.to_string(), "application/json".to_string());
        assert!(!request.is_sse());
    }

    #[test]
    fn offline_provider_reads_from_extra_map() {
        let mut request = EngineRequest::new("/v1/stream");
        assert!(request.offline_provider().is_none());
        request
            .extra
            .insert(OFFLINE_PROVIDER_KEY.to_string(), serde_json::json!({"fixture": "a"}));
        assert_eq!(
            request.offline_provider().unwrap()["fixture"],
            serde_json::json!("a")
        );
    }
}
