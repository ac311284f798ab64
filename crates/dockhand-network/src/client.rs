//! Asynchronous network inspection client.

use crate::decode::decode_inspection;
use crate::models::{InspectNetworkOptions, Inspection, NetworkFacts};
use crate::request;
use crate::Result;
use dockhand_core::version::negotiate;
use dockhand_core::{transport, ApiVersion, ConnectionConfig, Error, Transport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Builder for [`NetworkClient`].
#[derive(Clone)]
pub struct NetworkClientBuilder {
    config: ConnectionConfig,
    timeout: Duration,
    transport: Option<Arc<dyn Transport>>,
}

impl NetworkClientBuilder {
    /// Create a new builder from a connection configuration.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            timeout: config.timeout(),
            config,
            transport: None,
        }
    }

    /// Override the per-call deadline from the configuration.
    ///
    /// A transport built by [`NetworkClientBuilder::build`] uses the same
    /// value for its own request timeout; a transport passed to
    /// [`NetworkClientBuilder::with_transport`] keeps whatever it was built
    /// with.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a caller-supplied transport instead of one built from the endpoint.
    ///
    /// This is how a long-lived caller shares a pooled transport between
    /// clients.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client without contacting the daemon.
    ///
    /// The API version is negotiated on first use instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the transport
    /// cannot be built.
    pub fn build(self) -> Result<NetworkClient> {
        self.config.check()?;
        let minimum = self.config.minimum_api_version()?;
        let pinned = self.config.pinned_api_version()?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => transport::connect_with_timeout(&self.config, self.timeout)?,
        };

        Ok(NetworkClient {
            transport,
            timeout: self.timeout,
            minimum,
            pinned,
            negotiated: Arc::new(OnceCell::new()),
        })
    }

    /// Build the client and negotiate the API version immediately.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnsupportedVersion`] if the daemon is too old, in
    /// addition to everything [`NetworkClientBuilder::build`] can return.
    pub async fn connect(self) -> Result<NetworkClient> {
        let client = self.build()?;
        client.api_version().await?;
        Ok(client)
    }
}

/// Read-only client for inspecting networks.
///
/// Cheap to clone; clones share the transport and the negotiated version.
#[derive(Clone)]
pub struct NetworkClient {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    minimum: ApiVersion,
    pinned: Option<ApiVersion>,
    negotiated: Arc<OnceCell<ApiVersion>>,
}

impl NetworkClient {
    /// Connect using `config`, negotiating the API version up front.
    ///
    /// # Errors
    ///
    /// See [`NetworkClientBuilder::connect`].
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        NetworkClientBuilder::new(config).connect().await
    }

    /// The per-call deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The negotiated API version, asking the daemon on first call only.
    ///
    /// Concurrent first calls share one negotiation.
    ///
    /// # Errors
    ///
    /// Returns the negotiation error; a failed negotiation is retried by the
    /// next call.
    pub async fn api_version(&self) -> Result<ApiVersion> {
        self.with_deadline("API version negotiation", self.negotiated_version())
            .await
    }

    async fn negotiated_version(&self) -> Result<ApiVersion> {
        self.negotiated
            .get_or_try_init(|| async {
                let version =
                    negotiate(self.transport.as_ref(), self.minimum, self.pinned).await?;
                info!(%version, minimum = %self.minimum, "negotiated daemon API version");
                Ok::<_, Error>(version)
            })
            .await
            .copied()
    }

    /// Inspect a network by name or (short or long) ID.
    ///
    /// # Errors
    ///
    /// Returns an error for anything other than "found" or "not found".
    pub async fn inspect_network(&self, identifier: &str) -> Result<Inspection> {
        self.inspect_network_with(identifier, &InspectNetworkOptions::default())
            .await
    }

    /// Inspect a network with extra query options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] before any network call for an
    /// unusable identifier, [`Error::UnsupportedVersion`] for options the
    /// negotiated API lacks, and any transport or decode error otherwise.
    pub async fn inspect_network_with(
        &self,
        identifier: &str,
        options: &InspectNetworkOptions,
    ) -> Result<Inspection> {
        request::validate_identifier(identifier)?;

        // Negotiation on first use shares the call's deadline.
        let response = self
            .with_deadline("network inspection", async {
                let version = self.negotiated_version().await?;
                let request = request::inspect_network(version, identifier, options)?;
                info!(identifier, path = %request.path, "inspecting network");
                self.transport.send(&request).await
            })
            .await?;

        let inspection = decode_inspection(response.status, &response.body)?;
        debug!(identifier, exists = inspection.exists(), "network inspection finished");
        Ok(inspection)
    }

    /// `{ exists, network }` facts for a network.
    ///
    /// # Errors
    ///
    /// Same as [`NetworkClient::inspect_network`]; errors are never folded
    /// into `exists = false`.
    pub async fn network_facts(&self, identifier: &str) -> Result<NetworkFacts> {
        self.inspect_network(identifier).await.map(NetworkFacts::from)
    }

    /// `{ exists, network }` facts with extra query options.
    ///
    /// # Errors
    ///
    /// Same as [`NetworkClient::inspect_network_with`].
    pub async fn network_facts_with(
        &self,
        identifier: &str,
        options: &InspectNetworkOptions,
    ) -> Result<NetworkFacts> {
        self.inspect_network_with(identifier, options)
            .await
            .map(NetworkFacts::from)
    }

    /// Run `call` under the client deadline, closing the transport on expiry.
    async fn with_deadline<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{what} did not complete within {:?}",
                self.timeout
            ))),
        };

        if let Err(Error::Timeout(reason)) = &outcome {
            warn!(what, %reason, "daemon call timed out, closing transport");
            self.transport.close().await;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dockhand_core::{ApiRequest, RawResponse};
    use mockall::mock;
    use mockall::predicate::always;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    mock! {
        Daemon {}

        #[async_trait]
        impl Transport for Daemon {
            async fn send(&self, request: &ApiRequest) -> Result<RawResponse>;
            async fn close(&self);
        }
    }

    fn version_body(api_version: &str) -> RawResponse {
        RawResponse::new(
            200,
            serde_json::to_vec(&json!({"ApiVersion": api_version, "Version": "24.0.7"})).unwrap(),
        )
    }

    fn network_body(name: &str) -> RawResponse {
        RawResponse::new(
            200,
            serde_json::to_vec(&json!({
                "Name": name,
                "Id": "7d86d31b1478e7cca9ebed7e73aa0fdeec46c5ca29497431d3007d2d9e15ed99",
                "Driver": "bridge"
            }))
            .unwrap(),
        )
    }

    fn client_with(transport: impl Transport + 'static) -> NetworkClient {
        NetworkClientBuilder::new(ConnectionConfig::default())
            .with_transport(Arc::new(transport))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn negotiates_once_across_calls() {
        let mut daemon = MockDaemon::new();
        daemon
            .expect_send()
            .withf(|request| request.path == "/version")
            .times(1)
            .returning(|_| Ok(version_body("1.43")));
        daemon
            .expect_send()
            .withf(|request| request.path == "/v1.43/networks/web")
            .times(3)
            .returning(|_| Ok(network_body("web")));
        daemon.expect_close().never();

        let client = client_with(daemon);
        for _ in 0..3 {
            assert!(client.inspect_network("web").await.unwrap().exists());
        }
        assert_eq!(client.api_version().await.unwrap(), ApiVersion::new(1, 43));
    }

    #[tokio::test]
    async fn old_daemon_fails_connect_before_inspection() {
        let mut daemon = MockDaemon::new();
        daemon
            .expect_send()
            .with(always())
            .times(1)
            .returning(|_| Ok(version_body("1.20")));

        let err = NetworkClientBuilder::new(ConnectionConfig::default())
            .with_transport(Arc::new(daemon))
            .connect()
            .await
            .err()
            .unwrap();
        assert_eq!(
            err,
            Error::UnsupportedVersion {
                feature: "this client".to_string(),
                required: ApiVersion::new(1, 21),
                actual: ApiVersion::new(1, 20),
            }
        );
    }

    #[tokio::test]
    async fn pinned_version_is_used_in_paths() {
        let mut daemon = MockDaemon::new();
        daemon
            .expect_send()
            .withf(|request| request.path == "/version")
            .returning(|_| Ok(version_body("1.43")));
        daemon
            .expect_send()
            .withf(|request| request.path == "/v1.30/networks/my%20network")
            .times(1)
            .returning(|_| Ok(RawResponse::new(404, Vec::new())));

        let config = ConnectionConfig::default().with_api_version("1.30");
        let client = NetworkClientBuilder::new(config)
            .with_transport(Arc::new(daemon))
            .build()
            .unwrap();
        assert_eq!(
            client.inspect_network("my network").await.unwrap(),
            Inspection::NotFound
        );
    }

    #[tokio::test]
    async fn empty_identifier_never_reaches_daemon() {
        let mut daemon = MockDaemon::new();
        daemon.expect_send().never();

        let client = client_with(daemon);
        let err = client.inspect_network("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error_not_absence() {
        let mut daemon = MockDaemon::new();
        daemon
            .expect_send()
            .withf(|request| request.path == "/version")
            .returning(|_| Ok(version_body("1.43")));
        daemon
            .expect_send()
            .withf(|request| request.path.starts_with("/v1.43/networks/"))
            .returning(|_| Ok(RawResponse::new(200, b"{\"Name\": \"web\"".to_vec())));

        let client = client_with(daemon);
        let err = client.network_facts("web").await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn transport_errors_propagate_unchanged() {
        let mut daemon = MockDaemon::new();
        daemon
            .expect_send()
            .withf(|request| request.path == "/version")
            .returning(|_| Ok(version_body("1.43")));
        daemon
            .expect_send()
            .withf(|request| request.path.starts_with("/v1.43/"))
            .returning(|_| Err(Error::Connection("connection reset by peer".to_string())));

        let client = client_with(daemon);
        let err = client.inspect_network("web").await.unwrap_err();
        assert_eq!(err, Error::Connection("connection reset by peer".to_string()));
    }

    #[tokio::test]
    async fn transport_timeout_closes_transport() {
        let mut daemon = MockDaemon::new();
        daemon
            .expect_send()
            .withf(|request| request.path == "/version")
            .returning(|_| Ok(version_body("1.43")));
        daemon
            .expect_send()
            .withf(|request| request.path.starts_with("/v1.43/"))
            .returning(|_| Err(Error::Timeout("operation timed out".to_string())));
        daemon.expect_close().times(1).return_const(());

        let client = client_with(daemon);
        let err = client.inspect_network("web").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    /// Answers `/version` at once and stalls on everything else.
    struct StallingDaemon {
        closed: Arc<AtomicBool>,
        stalled_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for StallingDaemon {
        async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
            if request.path == "/version" {
                return Ok(version_body("1.43"));
            }
            self.stalled_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(network_body("never"))
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_times_out_and_closes() {
        let closed = Arc::new(AtomicBool::new(false));
        let stalled_calls = Arc::new(AtomicUsize::new(0));
        let daemon = StallingDaemon {
            closed: Arc::clone(&closed),
            stalled_calls: Arc::clone(&stalled_calls),
        };

        let client = NetworkClientBuilder::new(ConnectionConfig::default().with_timeout(2))
            .with_transport(Arc::new(daemon))
            .build()
            .unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        let err = client.inspect_network("slow-net").await.unwrap_err();

        assert!(matches!(err, Error::Timeout(_)), "got {err:?}");
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(stalled_calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    /// Takes `delay` to answer every request.
    struct SlowDaemon {
        delay: Duration,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for SlowDaemon {
        async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
            tokio::time::sleep(self.delay).await;
            if request.path == "/version" {
                Ok(version_body("1.43"))
            } else {
                Ok(RawResponse::new(404, Vec::new()))
            }
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_call_deadline_covers_negotiation() {
        let closed = Arc::new(AtomicBool::new(false));
        let daemon = SlowDaemon {
            delay: Duration::from_millis(1900),
            closed: Arc::clone(&closed),
        };

        let client = NetworkClientBuilder::new(ConnectionConfig::default().with_timeout(2))
            .with_transport(Arc::new(daemon))
            .build()
            .unwrap();

        let started = tokio::time::Instant::now();
        let err = client.inspect_network("web").await.unwrap_err();

        assert!(matches!(err, Error::Timeout(_)), "got {err:?}");
        assert!(closed.load(Ordering::SeqCst));
        assert!(started.elapsed() < Duration::from_millis(2100));

        // Negotiation finished inside the first call, so the next one only
        // pays for the inspection itself.
        closed.store(false, Ordering::SeqCst);
        assert_eq!(
            client.inspect_network("web").await.unwrap(),
            Inspection::NotFound
        );
        assert!(!closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn invalid_config_fails_build() {
        let config = ConnectionConfig::default().with_timeout(0);
        assert!(NetworkClientBuilder::new(config).build().is_err());
    }
}
