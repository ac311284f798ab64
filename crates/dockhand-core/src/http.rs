//! reqwest-backed transport for TCP and TLS daemon endpoints.

use crate::config::{
    ConnectionConfig, Endpoint, DEFAULT_POOL_IDLE_TIMEOUT, DEFAULT_POOL_MAX_IDLE_PER_HOST,
};
use crate::error::{Error, Result};
use crate::transport::{ApiRequest, RawResponse, Transport};
use crate::USER_AGENT;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Certificate, Client, ClientBuilder, Identity};
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Upper bound on the TCP connect phase, independent of the request deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to (re)build the underlying HTTP client.
#[derive(Clone)]
struct HttpSettings {
    timeout: Duration,
    pool: bool,
    tls_verify: bool,
    ca_cert: Option<Certificate>,
    identity: Option<Identity>,
}

/// Talks HTTP/1.1 to a daemon listening on TCP, optionally over TLS.
pub struct HttpTransport {
    base_url: Url,
    settings: HttpSettings,
    client: RwLock<Client>,
}

impl HttpTransport {
    /// Build a transport for a TCP endpoint.
    ///
    /// TLS material is read from disk here, so a bad certificate path fails
    /// construction rather than the first request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for UNIX endpoints and [`Error::Tls`] when
    /// certificate or key files cannot be read or parsed.
    pub fn new(endpoint: &Endpoint, config: &ConnectionConfig) -> Result<Self> {
        Self::with_timeout(endpoint, config, config.timeout())
    }

    /// Like [`HttpTransport::new`], but with a request timeout other than
    /// the configured one.
    ///
    /// # Errors
    ///
    /// Same as [`HttpTransport::new`].
    pub fn with_timeout(
        endpoint: &Endpoint,
        config: &ConnectionConfig,
        timeout: Duration,
    ) -> Result<Self> {
        let base = endpoint.base_url().ok_or_else(|| {
            Error::Config(format!("HTTP transport cannot serve `{endpoint}`"))
        })?;
        let base_url = Url::parse(&base)?;

        let mut settings = HttpSettings {
            timeout,
            pool: config.pool_connections,
            tls_verify: config.tls_verify,
            ca_cert: None,
            identity: None,
        };

        if endpoint.is_tls() {
            if let Some(path) = &config.tls_ca_cert {
                let pem = read_pem(path, "CA certificate")?;
                settings.ca_cert = Some(Certificate::from_pem(&pem).map_err(|err| {
                    Error::Tls(format!("Invalid CA certificate `{}`: {err}", path.display()))
                })?);
            }
            if let (Some(cert), Some(key)) = (&config.tls_client_cert, &config.tls_client_key) {
                let mut pem = read_pem(cert, "client certificate")?;
                pem.push(b'\n');
                pem.extend(read_pem(key, "client key")?);
                settings.identity = Some(Identity::from_pem(&pem).map_err(|err| {
                    Error::Tls(format!(
                        "Invalid client certificate `{}` or key `{}`: {err}",
                        cert.display(),
                        key.display()
                    ))
                })?);
            }
        }

        let client = build_client(&settings)?;
        debug!(base_url = %base_url, pool = settings.pool, "HTTP transport ready");

        Ok(Self {
            base_url,
            settings,
            client: RwLock::new(client),
        })
    }

    /// Access the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn client(&self) -> Result<Client> {
        self.client
            .read()
            .map(|client| client.clone())
            .map_err(|_| Error::Connection("HTTP client lock poisoned".to_string()))
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|err| Error::Tls(format!("Failed to read {what} `{}`: {err}", path.display())))
}

fn build_client(settings: &HttpSettings) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .use_rustls_tls()
        .timeout(settings.timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(settings.timeout))
        .user_agent(USER_AGENT);

    builder = if settings.pool {
        builder
            .pool_idle_timeout(Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT))
            .pool_max_idle_per_host(DEFAULT_POOL_MAX_IDLE_PER_HOST)
    } else {
        builder.pool_max_idle_per_host(0)
    };

    if let Some(ca) = &settings.ca_cert {
        builder = builder.add_root_certificate(ca.clone());
    }
    if let Some(identity) = &settings.identity {
        builder = builder.identity(identity.clone());
    }
    if !settings.tls_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|err| Error::Tls(format!("Failed to build HTTP client: {err}")))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        let mut url = self.base_url.clone();
        url.set_path(&request.path);

        let mut builder = self
            .client()?
            .request(request.method.clone(), url)
            .header(ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            let payload = serde_json::to_vec(body).map_err(|err| {
                Error::InvalidRequest(format!("Failed to encode request body: {err}"))
            })?;
            builder = builder.header(CONTENT_TYPE, "application/json").body(payload);
        }

        info!(method = %request.method, path = %request.path, "daemon request");

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|err| {
            Error::Connection(format!("Failed to read daemon response body: {err}"))
        })?;

        debug!(status, bytes = body.len(), "daemon response");
        Ok(RawResponse::new(status, body.to_vec()))
    }

    async fn close(&self) {
        if !self.settings.pool {
            return;
        }
        // Swapping in a fresh client drops every pooled connection of the old one.
        match build_client(&self.settings) {
            Ok(fresh) => {
                if let Ok(mut client) = self.client.write() {
                    *client = fresh;
                }
            }
            Err(err) => warn!(%err, "failed to rebuild HTTP client while closing"),
        }
    }
}
