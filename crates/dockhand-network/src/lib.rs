//! Network inspection client for container-runtime daemons.
//!
//! Answers one question reliably: does a network with this name or ID exist,
//! and if so, what does the daemon say about it.

#![deny(missing_docs)]

pub mod client;
pub mod decode;
pub mod models;
pub mod request;

pub use client::{NetworkClient, NetworkClientBuilder};
pub use models::{Document, InspectNetworkOptions, Inspection, NetworkFacts, NetworkScope};

/// Convenient result alias sharing the `dockhand-core` error type.
pub type Result<T> = dockhand_core::Result<T>;
