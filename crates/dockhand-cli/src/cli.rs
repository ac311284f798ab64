//! Command-line argument parsing

use clap::Parser;
use dockhand_core::ConnectionConfig;
use dockhand_network::{InspectNetworkOptions, NetworkScope};
use std::path::PathBuf;

/// Command-line arguments structure
#[derive(Parser, Debug)]
#[command(name = "docker-network-info")]
#[command(about = "Report whether a container network exists and how it is configured")]
#[command(version)]
pub struct Cli {
    /// Network name or ID
    pub name: String,

    /// Daemon endpoint, overriding DOCKER_HOST
    #[arg(short = 'H', long, help = "Daemon endpoint (unix://, tcp://, https://)")]
    pub host: Option<String>,

    /// API version to pin instead of the daemon's
    #[arg(long, help = "Pin the API version, or `auto`")]
    pub api_version: Option<String>,

    /// Per-request deadline in seconds
    #[arg(long, help = "Request timeout in seconds")]
    pub timeout: Option<u64>,

    /// Use TLS without verifying the daemon
    #[arg(long)]
    pub tls: bool,

    /// Use TLS and verify the daemon
    #[arg(long)]
    pub tls_verify: bool,

    /// Directory holding ca.pem, cert.pem and key.pem
    #[arg(long, help = "Directory with ca.pem, cert.pem and key.pem")]
    pub cert_path: Option<PathBuf>,

    /// Ask for service details of swarm networks
    #[arg(long)]
    pub verbose: bool,

    /// Restrict the lookup to one scope
    #[arg(long, help = "local, global or swarm")]
    pub scope: Option<NetworkScope>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// Apply CLI arguments over a base configuration
    #[must_use]
    pub fn apply_to_config(&self, mut config: ConnectionConfig) -> ConnectionConfig {
        if let Some(ref host) = self.host {
            config = config.with_docker_host(host.clone());
        }

        if let Some(ref version) = self.api_version {
            config = config.with_api_version(version.clone());
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        if self.tls_verify {
            config = config.with_tls(true).with_tls_verify(true);
        } else if self.tls {
            config = config.with_tls(true).with_tls_verify(false);
        }

        if let Some(ref dir) = self.cert_path {
            config = config.with_cert_path(dir);
        }

        config
    }

    /// Inspection options requested on the command line
    #[must_use]
    pub fn options(&self) -> InspectNetworkOptions {
        let options = InspectNetworkOptions::default().verbose(self.verbose);
        match self.scope {
            Some(scope) => options.scope(scope),
            None => options,
        }
    }
}
