//! The request/response seam between clients and the daemon.
//!
//! Resource clients only ever see [`Transport`]: they hand it an
//! [`ApiRequest`] and get back a [`RawResponse`]. Decoding and status mapping
//! happen above this layer.

use crate::config::{ConnectionConfig, Endpoint};
use crate::error::Result;
use crate::http::HttpTransport;
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A single HTTP request against the daemon API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Already percent-encoded absolute path, e.g. `/v1.43/networks/web`
    pub path: String,
    /// Query parameters, encoded by the transport
    pub query: Vec<(&'static str, String)>,
    /// Optional JSON body
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// A body-less `GET` for the given path.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Attach query parameters.
    #[must_use]
    pub fn with_query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query = query;
        self
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path plus encoded query string, as sent on the request line.
    #[must_use]
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter().map(|(key, value)| (*key, value.as_str())))
            .finish();
        format!("{}?{query}", self.path)
    }
}

/// Status and body of a daemon response, undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Sends requests to the daemon.
///
/// Implementations open a fresh connection per call unless they were
/// explicitly configured to pool. They never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Connection`] if the daemon is unreachable,
    /// [`crate::Error::Tls`] on handshake failure and [`crate::Error::Timeout`] if the
    /// transport's own deadline passes.
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse>;

    /// Tear down any connections this transport still holds.
    async fn close(&self);
}

/// Builds the transport matching the configured endpoint.
///
/// # Errors
///
/// Returns an error if the endpoint cannot be parsed, TLS material cannot be
/// loaded, or a UNIX socket is requested on a platform without them.
pub fn connect(config: &ConnectionConfig) -> Result<Arc<dyn Transport>> {
    connect_with_timeout(config, config.timeout())
}

/// Builds the transport for the configured endpoint with an explicit
/// per-request timeout.
///
/// # Errors
///
/// Same as [`connect`].
pub fn connect_with_timeout(
    config: &ConnectionConfig,
    timeout: Duration,
) -> Result<Arc<dyn Transport>> {
    let endpoint = config.endpoint()?;
    debug!(%endpoint, "selecting transport");

    match endpoint {
        #[cfg(unix)]
        Endpoint::Unix(path) => Ok(Arc::new(crate::unix::UnixTransport::new(path))),
        #[cfg(not(unix))]
        Endpoint::Unix(path) => Err(crate::error::Error::Config(format!(
            "UNIX socket `{}` is not supported on this platform",
            path.display()
        ))),
        tcp @ (Endpoint::Tcp { .. } | Endpoint::TcpTls { .. }) => {
            Ok(Arc::new(HttpTransport::with_timeout(&tcp, config, timeout)?))
        }
    }
}
