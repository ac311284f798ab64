//! API version parsing and negotiation.
//!
//! The daemon prefixes every versioned path with `/v{major}.{minor}`. A client
//! asks the daemon which version it speaks once, checks it against its own
//! minimum and then uses the result for every later request.

use crate::error::{Error, Result};
use crate::transport::{ApiRequest, Transport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Oldest API version dockhand clients accept by default.
pub const MINIMUM_API_VERSION: ApiVersion = ApiVersion::new(1, 21);

/// Unversioned path reporting the daemon's version information.
pub const VERSION_PATH: &str = "/version";

/// A `major.minor` API version, ordered by `(major, minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion {
    major: u32,
    minor: u32,
}

impl ApiVersion {
    /// Creates a version from its parts.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Major component.
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// Minor component.
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("Invalid API version `{s}`, expected MAJOR.MINOR"));
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        let major = major.parse().map_err(|_| invalid())?;
        let minor = minor.parse().map_err(|_| invalid())?;
        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ApiVersion> for String {
    fn from(version: ApiVersion) -> Self {
        version.to_string()
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The parts of the daemon's `/version` document we rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionInfo {
    /// Highest API version the daemon speaks
    pub api_version: String,

    /// Oldest API version the daemon still accepts
    #[serde(rename = "MinAPIVersion", default, skip_serializing_if = "Option::is_none")]
    pub min_api_version: Option<String>,

    /// Engine release version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Operating system the daemon runs on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    /// CPU architecture the daemon runs on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Asks the daemon for its API version and settles on the one to use.
///
/// The daemon must speak at least `minimum`. When `pinned` is given it becomes
/// the negotiated version, provided it also satisfies `minimum`; otherwise the
/// daemon's own version is used.
///
/// # Errors
///
/// Returns [`Error::UnsupportedVersion`] when either version is below
/// `minimum`, [`Error::Decode`] when the version document is malformed and
/// any transport or status error from the request itself.
pub async fn negotiate(
    transport: &dyn Transport,
    minimum: ApiVersion,
    pinned: Option<ApiVersion>,
) -> Result<ApiVersion> {
    let response = transport.send(&ApiRequest::get(VERSION_PATH)).await?;
    if !response.is_success() {
        return Err(Error::from_status(response.status, &response.body));
    }

    let info: VersionInfo = serde_json::from_slice(&response.body)
        .map_err(|err| Error::Decode(format!("Invalid {VERSION_PATH} document: {err}")))?;
    let daemon: ApiVersion = info.api_version.parse().map_err(|_| {
        Error::Decode(format!(
            "Daemon reported unparseable API version `{}`",
            info.api_version
        ))
    })?;

    debug!(
        %daemon,
        %minimum,
        engine = info.version.as_deref().unwrap_or("unknown"),
        "daemon API version"
    );

    if daemon < minimum {
        return Err(Error::UnsupportedVersion {
            feature: "this client".to_string(),
            required: minimum,
            actual: daemon,
        });
    }

    match pinned {
        Some(version) if version < minimum => Err(Error::UnsupportedVersion {
            feature: "this client".to_string(),
            required: minimum,
            actual: version,
        }),
        Some(version) => Ok(version),
        None => Ok(daemon),
    }
}
