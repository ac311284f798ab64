//! Connection configuration for daemon clients.
//!
//! This module provides the configuration a client is built from: where the
//! daemon listens, which TLS material to present, the API version bounds and
//! the per-request deadline. Configuration is validated before any network
//! call is made and never changes after the client is built.

use crate::error::{Error, Result};
use crate::version::{ApiVersion, MINIMUM_API_VERSION};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Default daemon endpoint on Linux hosts.
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Conventional plain-text TCP port of the daemon.
pub const DEFAULT_TCP_PORT: u16 = 2375;

/// Conventional TLS port of the daemon.
pub const DEFAULT_TLS_PORT: u16 = 2376;

/// Idle timeout for pooled connections, in seconds.
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Maximum idle pooled connections per host.
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Value of `api_version` that asks for the daemon's own version.
pub const AUTO_API_VERSION: &str = "auto";

/// Configuration for connecting to a container-runtime daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConnectionConfig {
    /// Daemon endpoint: `unix://`, `tcp://`, `http://`, `tcp+tls://` or `https://`
    #[validate(length(min = 1))]
    #[serde(default = "default_docker_host")]
    pub docker_host: String,

    /// Upgrade a `tcp://` endpoint to TLS
    #[serde(default)]
    pub tls: bool,

    /// Whether to verify the daemon's certificate
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// CA certificate used to verify the daemon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Client certificate presented to the daemon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_cert: Option<PathBuf>,

    /// Private key for the client certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_key: Option<PathBuf>,

    /// Pinned API version, or `auto` / unset to use the daemon's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Oldest daemon API version the client accepts
    #[serde(default = "default_min_api_version")]
    pub min_api_version: String,

    /// Per-request deadline in seconds
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Keep idle connections open between calls
    #[serde(default)]
    pub pool_connections: bool,
}

fn default_docker_host() -> String {
    DEFAULT_DOCKER_HOST.to_string()
}

const fn default_tls_verify() -> bool {
    true
}

fn default_min_api_version() -> String {
    MINIMUM_API_VERSION.to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ConnectionConfig {
    /// Create a configuration for the given daemon endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or validation fails.
    pub fn new(docker_host: impl Into<String>) -> Result<Self> {
        let config = Self::default().with_docker_host(docker_host);
        config.check()?;
        Ok(config)
    }

    /// Build a configuration from the standard `DOCKER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unusable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from `DOCKER_*` variables supplied by `lookup`.
    ///
    /// Recognises `DOCKER_HOST`, `DOCKER_TLS`, `DOCKER_TLS_VERIFY`,
    /// `DOCKER_CERT_PATH`, `DOCKER_API_VERSION` and `DOCKER_TIMEOUT`. Setting
    /// `DOCKER_TLS_VERIFY` implies TLS; `DOCKER_TLS` alone enables TLS without
    /// verifying the daemon.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = var("DOCKER_HOST") {
            config.docker_host = host;
        }

        let verify = var("DOCKER_TLS_VERIFY").is_some_and(|v| truthy(&v));
        let tls = var("DOCKER_TLS").is_some_and(|v| truthy(&v));
        if verify || tls {
            config.tls = true;
            config.tls_verify = verify;
        }

        if let Some(dir) = var("DOCKER_CERT_PATH") {
            config = config.with_cert_path(dir);
        }

        if let Some(version) = var("DOCKER_API_VERSION") {
            config.api_version = Some(version);
        }

        if let Some(timeout) = var("DOCKER_TIMEOUT") {
            config.timeout_secs = timeout.trim().parse().map_err(|_| {
                Error::Config(format!("DOCKER_TIMEOUT must be a number of seconds, got `{timeout}`"))
            })?;
        }

        config.check()?;
        Ok(config)
    }

    /// Set the daemon endpoint.
    #[must_use]
    pub fn with_docker_host(mut self, docker_host: impl Into<String>) -> Self {
        self.docker_host = docker_host.into();
        self
    }

    /// Enable or disable TLS for `tcp://` endpoints.
    #[must_use]
    pub const fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Set whether to verify the daemon's certificate.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set the CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_ca_cert = Some(path.into());
        self
    }

    /// Set the client certificate and key paths.
    #[must_use]
    pub fn with_client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.tls_client_cert = Some(cert.into());
        self.tls_client_key = Some(key.into());
        self
    }

    /// Use `ca.pem`, `cert.pem` and `key.pem` from a Docker certificate directory.
    #[must_use]
    pub fn with_cert_path(self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.with_ca_cert(dir.join("ca.pem"))
            .with_client_cert(dir.join("cert.pem"), dir.join("key.pem"))
    }

    /// Pin the API version (`auto` means use the daemon's).
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the minimum accepted daemon API version.
    #[must_use]
    pub fn with_min_api_version(mut self, version: ApiVersion) -> Self {
        self.min_api_version = version.to_string();
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Keep idle connections open between calls.
    #[must_use]
    pub const fn with_pooling(mut self, enabled: bool) -> Self {
        self.pool_connections = enabled;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parse the configured daemon endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be parsed.
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.docker_host, self.tls)
    }

    /// Parse the minimum API version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version string is malformed.
    pub fn minimum_api_version(&self) -> Result<ApiVersion> {
        self.min_api_version.parse()
    }

    /// Parse the pinned API version; `None` means negotiate.
    ///
    /// # Errors
    ///
    /// Returns an error if the version string is malformed.
    pub fn pinned_api_version(&self) -> Result<Option<ApiVersion>> {
        match self.api_version.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(version) if version.eq_ignore_ascii_case(AUTO_API_VERSION) => Ok(None),
            Some(version) => version.parse().map(Some),
        }
    }

    /// Validate every field, including the ones serde cannot check.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
        self.endpoint()?;
        self.minimum_api_version()?;
        self.pinned_api_version()?;

        if self.tls_client_cert.is_some() != self.tls_client_key.is_some() {
            return Err(Error::Config(
                "tls_client_cert and tls_client_key must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            docker_host: default_docker_host(),
            tls: false,
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            tls_client_cert: None,
            tls_client_key: None,
            api_version: None,
            min_api_version: default_min_api_version(),
            timeout_secs: default_timeout_secs(),
            pool_connections: false,
        }
    }
}

fn truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// UNIX domain socket at an absolute path
    Unix(PathBuf),
    /// Plain-text TCP
    Tcp {
        /// Host name or address
        host: String,
        /// Port
        port: u16,
    },
    /// TCP wrapped in TLS
    TcpTls {
        /// Host name or address
        host: String,
        /// Port
        port: u16,
    },
}

impl Endpoint {
    /// Parse a daemon URI. `force_tls` upgrades `tcp://` and `http://` to TLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed URIs, unknown schemes, relative
    /// socket paths and missing hosts.
    pub fn parse(uri: &str, force_tls: bool) -> Result<Self> {
        let url = Url::parse(uri.trim())
            .map_err(|e| Error::Config(format!("Invalid docker host `{uri}`: {e}")))?;

        match url.scheme() {
            "unix" => {
                // Raw text after the scheme; `url.path()` would stay percent-encoded.
                let rest = uri.trim().get(url.scheme().len() + 1..).unwrap_or_default();
                let path = rest.strip_prefix("//").unwrap_or(rest);
                if !path.starts_with('/') {
                    return Err(Error::Config(format!(
                        "UNIX socket path in `{uri}` must be absolute (unix:///path/to/socket)"
                    )));
                }
                Ok(Self::Unix(PathBuf::from(path)))
            }
            "tcp" | "http" if !force_tls => {
                let (host, port) = host_and_port(&url, uri, DEFAULT_TCP_PORT)?;
                Ok(Self::Tcp { host, port })
            }
            "tcp" | "http" | "tcp+tls" | "https" => {
                let (host, port) = host_and_port(&url, uri, DEFAULT_TLS_PORT)?;
                Ok(Self::TcpTls { host, port })
            }
            other => Err(Error::Config(format!(
                "Unsupported docker host scheme `{other}` in `{uri}`"
            ))),
        }
    }

    /// HTTP base URL for TCP endpoints; `None` for UNIX sockets.
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        match self {
            Self::Unix(_) => None,
            Self::Tcp { host, port } => Some(format!("http://{host}:{port}")),
            Self::TcpTls { host, port } => Some(format!("https://{host}:{port}")),
        }
    }

    /// True if the endpoint uses TLS.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::TcpTls { .. })
    }
}

fn host_and_port(url: &Url, uri: &str, default_port: u16) -> Result<(String, u16)> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::Config(format!("Docker host `{uri}` is missing a host name")))?;
    Ok((host.to_string(), url.port().unwrap_or(default_port)))
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::TcpTls { host, port } => write!(f, "tcp+tls://{host}:{port}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.docker_host, DEFAULT_DOCKER_HOST);
        assert!(!config.tls);
        assert!(config.tls_verify);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.minimum_api_version().unwrap(), ApiVersion::new(1, 21));
        assert_eq!(config.pinned_api_version().unwrap(), None);
        assert!(!config.pool_connections);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_new_validates() {
        assert!(ConnectionConfig::new("tcp://10.0.0.5:2375").is_ok());
        assert!(ConnectionConfig::new("").is_err());
        assert!(ConnectionConfig::new("ftp://example.com").is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = ConnectionConfig::default()
            .with_docker_host("tcp://docker.internal")
            .with_tls(true)
            .with_tls_verify(false)
            .with_cert_path("/certs")
            .with_api_version("1.41")
            .with_min_api_version(ApiVersion::new(1, 25))
            .with_timeout(5)
            .with_pooling(true);

        assert_eq!(config.tls_ca_cert, Some(PathBuf::from("/certs/ca.pem")));
        assert_eq!(config.tls_client_cert, Some(PathBuf::from("/certs/cert.pem")));
        assert_eq!(config.tls_client_key, Some(PathBuf::from("/certs/key.pem")));
        assert_eq!(config.pinned_api_version().unwrap(), Some(ApiVersion::new(1, 41)));
        assert_eq!(config.minimum_api_version().unwrap(), ApiVersion::new(1, 25));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.pool_connections);
        assert_eq!(
            config.endpoint().unwrap(),
            Endpoint::TcpTls {
                host: "docker.internal".to_string(),
                port: DEFAULT_TLS_PORT
            }
        );
    }

    #[test]
    fn test_timeout_range_is_validated() {
        assert!(ConnectionConfig::default().with_timeout(0).check().is_err());
        assert!(ConnectionConfig::default().with_timeout(601).check().is_err());
        assert!(ConnectionConfig::default().with_timeout(2).check().is_ok());
    }

    #[test]
    fn test_auto_api_version() {
        let config = ConnectionConfig::default().with_api_version("auto");
        assert_eq!(config.pinned_api_version().unwrap(), None);

        let config = ConnectionConfig::default().with_api_version("AUTO");
        assert_eq!(config.pinned_api_version().unwrap(), None);

        let config = ConnectionConfig::default().with_api_version("newest");
        assert!(config.check().is_err());
    }

    #[test]
    fn test_client_cert_requires_key() {
        let mut config = ConnectionConfig::default();
        config.tls_client_cert = Some(PathBuf::from("/certs/cert.pem"));
        assert!(matches!(config.check(), Err(Error::Config(_))));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"docker_host":"tcp://127.0.0.1:2375"}"#).unwrap();
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.min_api_version, "1.21");
        assert!(config.tls_verify);

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("tls_ca_cert"));
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = ConnectionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ConnectionConfig::default());
    }

    #[test]
    fn test_from_lookup_tls_verify() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("DOCKER_HOST", "tcp://swarm.example.com:2376"),
            ("DOCKER_TLS_VERIFY", "1"),
            ("DOCKER_CERT_PATH", "/home/ops/.docker"),
            ("DOCKER_API_VERSION", "1.40"),
            ("DOCKER_TIMEOUT", "15"),
        ]))
        .unwrap();

        assert!(config.tls);
        assert!(config.tls_verify);
        assert_eq!(
            config.tls_ca_cert,
            Some(PathBuf::from("/home/ops/.docker/ca.pem"))
        );
        assert_eq!(config.pinned_api_version().unwrap(), Some(ApiVersion::new(1, 40)));
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert!(config.endpoint().unwrap().is_tls());
    }

    #[test]
    fn test_from_lookup_tls_without_verify() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("DOCKER_HOST", "tcp://10.1.2.3"),
            ("DOCKER_TLS", "true"),
        ]))
        .unwrap();
        assert!(config.tls);
        assert!(!config.tls_verify);
    }

    #[test]
    fn test_from_lookup_falsy_values() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("DOCKER_TLS_VERIFY", "0"),
            ("DOCKER_TLS", "false"),
            ("DOCKER_HOST", ""),
        ]))
        .unwrap();
        assert!(!config.tls);
        assert_eq!(config.docker_host, DEFAULT_DOCKER_HOST);
    }

    #[test]
    fn test_from_lookup_bad_timeout() {
        let err = ConnectionConfig::from_lookup(lookup(&[("DOCKER_TIMEOUT", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_parse_endpoints() {
        assert_eq!(
            Endpoint::parse("unix:///var/run/docker.sock", false).unwrap(),
            Endpoint::Unix(PathBuf::from("/var/run/docker.sock"))
        );
        assert_eq!(
            Endpoint::parse("tcp://127.0.0.1:2375", false).unwrap(),
            Endpoint::Tcp {
                host: "127.0.0.1".to_string(),
                port: 2375
            }
        );
        assert_eq!(
            Endpoint::parse("http://docker", false).unwrap(),
            Endpoint::Tcp {
                host: "docker".to_string(),
                port: DEFAULT_TCP_PORT
            }
        );
        assert_eq!(
            Endpoint::parse("tcp+tls://docker:3376", false).unwrap(),
            Endpoint::TcpTls {
                host: "docker".to_string(),
                port: 3376
            }
        );
        assert_eq!(
            Endpoint::parse("https://docker", false).unwrap(),
            Endpoint::TcpTls {
                host: "docker".to_string(),
                port: DEFAULT_TLS_PORT
            }
        );
        assert!(Endpoint::parse("tcp://docker", true).unwrap().is_tls());
    }

    #[test]
    fn test_parse_unix_path_is_taken_literally() {
        assert_eq!(
            Endpoint::parse("unix:///tmp/my dir/docker.sock", false).unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/my dir/docker.sock"))
        );
        assert_eq!(
            Endpoint::parse("unix:///run/user/1000/docker%20test.sock", false).unwrap(),
            Endpoint::Unix(PathBuf::from("/run/user/1000/docker%20test.sock"))
        );
        assert_eq!(
            Endpoint::parse("unix:/var/run/docker.sock", false).unwrap(),
            Endpoint::Unix(PathBuf::from("/var/run/docker.sock"))
        );
    }

    #[test]
    fn test_parse_endpoint_errors() {
        assert!(Endpoint::parse("unix://relative.sock", false).is_err());
        assert!(Endpoint::parse("tcp://", false).is_err());
        assert!(Endpoint::parse("npipe:////./pipe/docker_engine", false).is_err());
        assert!(Endpoint::parse("/var/run/docker.sock", false).is_err());
    }

    #[test]
    fn test_endpoint_base_url_and_display() {
        let tcp = Endpoint::Tcp {
            host: "127.0.0.1".to_string(),
            port: 2375,
        };
        assert_eq!(tcp.base_url().as_deref(), Some("http://127.0.0.1:2375"));
        assert_eq!(tcp.to_string(), "tcp://127.0.0.1:2375");

        let unix = Endpoint::Unix(PathBuf::from("/run/docker.sock"));
        assert!(unix.base_url().is_none());
        assert_eq!(unix.to_string(), "unix:///run/docker.sock");
    }
}
