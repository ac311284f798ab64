//! Inspection results and request options.

use dockhand_core::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The daemon's description of a network, passed through untouched.
///
/// Kept untyped so that fields added or dropped between daemon versions
/// survive the round trip. Key order matches the daemon's response.
pub type Document = Map<String, Value>;

/// Outcome of an inspection that reached the daemon.
#[derive(Debug, Clone, PartialEq)]
pub enum Inspection {
    /// The network exists
    Found(Document),
    /// No network matches the identifier
    NotFound,
}

impl Inspection {
    /// True if the network exists.
    #[must_use]
    pub const fn exists(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// The inspection document, if found.
    #[must_use]
    pub const fn document(&self) -> Option<&Document> {
        match self {
            Self::Found(document) => Some(document),
            Self::NotFound => None,
        }
    }

    /// Consume into the inspection document, if found.
    #[must_use]
    pub fn into_document(self) -> Option<Document> {
        match self {
            Self::Found(document) => Some(document),
            Self::NotFound => None,
        }
    }

    /// The network's full ID.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.document()?.get("Id")?.as_str()
    }

    /// The network's name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.document()?.get("Name")?.as_str()
    }
}

/// `{ exists, network }` view of an inspection, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkFacts {
    /// Whether the network exists
    pub exists: bool,
    /// The inspection document; `null` when the network does not exist
    pub network: Option<Document>,
}

impl From<Inspection> for NetworkFacts {
    fn from(inspection: Inspection) -> Self {
        Self {
            exists: inspection.exists(),
            network: inspection.into_document(),
        }
    }
}

/// Where the daemon should look for the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkScope {
    /// Networks local to this daemon
    Local,
    /// Networks shared through a global key-value store
    Global,
    /// Swarm-scoped overlay networks
    Swarm,
}

impl NetworkScope {
    /// Query-string value for this scope.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Global => "global",
            Self::Swarm => "swarm",
        }
    }
}

impl fmt::Display for NetworkScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "global" => Ok(Self::Global),
            "swarm" => Ok(Self::Swarm),
            other => Err(Error::InvalidRequest(format!(
                "Unknown network scope `{other}` (expected local, global or swarm)"
            ))),
        }
    }
}

/// Optional query parameters for a network inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectNetworkOptions {
    /// Include service and task details for swarm networks (API 1.28+)
    pub verbose: bool,
    /// Restrict the lookup to one scope (API 1.31+)
    pub scope: Option<NetworkScope>,
}

impl InspectNetworkOptions {
    /// Request verbose output.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Restrict the lookup to `scope`.
    #[must_use]
    pub const fn scope(mut self, scope: NetworkScope) -> Self {
        self.scope = Some(scope);
        self
    }
}
