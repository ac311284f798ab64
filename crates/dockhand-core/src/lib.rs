//! # dockhand-core
//!
//! Core plumbing for talking to a container-runtime daemon over its HTTP API.
//!
//! This crate provides the pieces every resource client shares: connection
//! configuration, the transport seam (TCP, TLS and UNIX sockets), API version
//! negotiation and the error taxonomy.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code mapping
//! - [`config`] - Connection configuration and daemon endpoint parsing
//! - [`version`] - API version parsing, ordering and negotiation
//! - [`transport`] - The request/response seam and transport selection
//! - [`http`] - reqwest-backed transport for TCP and TLS endpoints
//! - [`unix`] - HTTP/1.1 over UNIX domain sockets
//! - [`query`] - Query parameter builder

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod transport;
#[cfg(unix)]
pub mod unix;
pub mod version;

// Re-export commonly used types
pub use config::{ConnectionConfig, Endpoint};
pub use error::{Error, Result};
pub use transport::{ApiRequest, RawResponse, Transport};
pub use version::ApiVersion;

/// User agent sent with every daemon request.
pub const USER_AGENT: &str = concat!("dockhand/", env!("CARGO_PKG_VERSION"));
