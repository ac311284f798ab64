//! Request construction for network operations.
//!
//! Pure functions: the same inputs always give the same [`ApiRequest`].

use crate::models::InspectNetworkOptions;
use crate::Result;
use dockhand_core::query::QueryParams;
use dockhand_core::{ApiRequest, ApiVersion, Error};
use url::Url;

/// First API version accepting `verbose` on network inspect.
pub const VERBOSE_MIN_VERSION: ApiVersion = ApiVersion::new(1, 28);

/// First API version accepting `scope` on network inspect.
pub const SCOPE_MIN_VERSION: ApiVersion = ApiVersion::new(1, 31);

/// Scratch base used only to borrow `url`'s path-segment encoding.
const PATH_BASE: &str = "http://daemon.invalid/";

/// Reject identifiers that cannot name a network.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] for empty identifiers and for `.`/`..`,
/// which would alter the request path instead of naming a network.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(Error::InvalidRequest(
            "Network name or ID must not be empty".to_string(),
        ));
    }
    if identifier == "." || identifier == ".." {
        return Err(Error::InvalidRequest(format!(
            "`{identifier}` is not a valid network name or ID"
        )));
    }
    Ok(())
}

/// Build `/v{version}/{segments...}` with every segment percent-encoded.
///
/// # Errors
///
/// Never fails for the fixed base in practice; errors are surfaced as
/// [`Error::InvalidRequest`] rather than panicking.
pub fn versioned_path(version: ApiVersion, segments: &[&str]) -> Result<String> {
    let mut url = Url::parse(PATH_BASE)?;
    url.path_segments_mut()
        .map_err(|()| Error::InvalidRequest("Cannot build request path".to_string()))?
        .clear()
        .push(&format!("v{version}"))
        .extend(segments);
    Ok(url.path().to_string())
}

/// `GET /v{version}/networks/{identifier}` with optional query parameters.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] for unusable identifiers and
/// [`Error::UnsupportedVersion`] when an option needs a newer API than
/// `version`.
pub fn inspect_network(
    version: ApiVersion,
    identifier: &str,
    options: &InspectNetworkOptions,
) -> Result<ApiRequest> {
    validate_identifier(identifier)?;

    if options.verbose && version < VERBOSE_MIN_VERSION {
        return Err(Error::UnsupportedVersion {
            feature: "verbose network inspection".to_string(),
            required: VERBOSE_MIN_VERSION,
            actual: version,
        });
    }
    if options.scope.is_some() && version < SCOPE_MIN_VERSION {
        return Err(Error::UnsupportedVersion {
            feature: "scoped network inspection".to_string(),
            required: SCOPE_MIN_VERSION,
            actual: version,
        });
    }

    let mut query = QueryParams::new();
    query.push_flag("verbose", options.verbose);
    query.push_opt("scope", options.scope);

    let path = versioned_path(version, &["networks", identifier])?;
    Ok(ApiRequest::get(path).with_query(query.into_pairs()))
}
