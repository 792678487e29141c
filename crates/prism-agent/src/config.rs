//! Environment configuration for the exporter daemon
//!
//! All configuration is collected up front into one [`ExporterConfig`]:
//! required variables are validated together and reported in a single
//! aggregated error, optional variables fall back to their defaults with
//! a logged warning when the supplied value does not parse.

use prism_api::{ApiVersion, ClientPolicy};
use prism_core::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Central cluster identity (required).
pub const ENV_CENTRAL_NAME: &str = "PRISM_CENTRAL_NAME";
/// Central cluster base URL (required).
pub const ENV_CENTRAL_URL: &str = "PRISM_CENTRAL_URL";
/// Central API schema version, `v3` or `v4` (optional).
pub const ENV_API_VERSION: &str = "PRISM_API_VERSION";
/// Cluster name prefix filter (optional).
pub const ENV_CLUSTER_PREFIX: &str = "PRISM_CLUSTER_PREFIX";
/// Discovery refresh interval, humantime format (optional).
pub const ENV_REFRESH_INTERVAL: &str = "PRISM_REFRESH_INTERVAL";
/// Scrape server bind address (optional).
pub const ENV_LISTEN_ADDR: &str = "PRISM_LISTEN_ADDR";
/// Metric definition directory (optional).
pub const ENV_METRICS_DIR: &str = "PRISM_METRICS_DIR";
/// Skip upstream TLS certificate verification (optional).
pub const ENV_SKIP_TLS_VERIFY: &str = "PRISM_SKIP_TLS_VERIFY";
/// Upstream request timeout, humantime format (optional).
pub const ENV_REQUEST_TIMEOUT: &str = "PRISM_REQUEST_TIMEOUT";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9408";
const DEFAULT_METRICS_DIR: &str = "configs";
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Complete configuration for the exporter daemon.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Central cluster identity
    pub central_name: String,

    /// Central cluster base URL
    pub central_url: String,

    /// Central API schema version
    pub api_version: ApiVersion,

    /// Only expose clusters whose name starts with this prefix
    pub cluster_prefix: Option<String>,

    /// Re-discovery interval
    pub refresh_interval: Duration,

    /// Scrape server bind address
    pub listen_addr: SocketAddr,

    /// Directory holding the per-entity allow-list files
    pub metrics_dir: PathBuf,

    /// Skip TLS certificate verification toward the upstream APIs
    pub skip_tls_verify: bool,

    /// Bound on every upstream request
    pub request_timeout: Duration,
}

impl ExporterConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through a lookup function. Required values
    /// are validated together; one aggregated error names everything
    /// that is missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing = Vec::new();
        let central_name = required(&lookup, ENV_CENTRAL_NAME, &mut missing);
        let central_url = required(&lookup, ENV_CENTRAL_URL, &mut missing);
        if !missing.is_empty() {
            return Err(Error::config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let api_version = match lookup(ENV_API_VERSION).filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "unrecognized API version, defaulting to {}", ApiVersion::default());
                ApiVersion::default()
            }),
            None => ApiVersion::default(),
        };

        let cluster_prefix = lookup(ENV_CLUSTER_PREFIX).filter(|p| !p.is_empty());

        let refresh_interval = duration_or_default(
            lookup(ENV_REFRESH_INTERVAL),
            ENV_REFRESH_INTERVAL,
            DEFAULT_REFRESH_INTERVAL,
        );
        let request_timeout = duration_or_default(
            lookup(ENV_REQUEST_TIMEOUT),
            ENV_REQUEST_TIMEOUT,
            DEFAULT_REQUEST_TIMEOUT,
        );

        let listen_addr = match lookup(ENV_LISTEN_ADDR).filter(|a| !a.is_empty()) {
            Some(raw) => raw.parse().map_err(|e| {
                Error::config(format!("invalid {}: {}: {}", ENV_LISTEN_ADDR, raw, e))
            })?,
            None => default_listen_addr(),
        };

        let metrics_dir = lookup(ENV_METRICS_DIR)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_METRICS_DIR));

        let skip_tls_verify = match lookup(ENV_SKIP_TLS_VERIFY).filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "invalid {}, defaulting to true", ENV_SKIP_TLS_VERIFY);
                true
            }),
            None => true,
        };

        Ok(Self {
            central_name,
            central_url,
            api_version,
            cluster_prefix,
            refresh_interval,
            listen_addr,
            metrics_dir,
            skip_tls_verify,
            request_timeout,
        })
    }

    /// TLS and timeout policy for every API client built by the daemon.
    pub fn client_policy(&self) -> ClientPolicy {
        ClientPolicy {
            skip_tls_verify: self.skip_tls_verify,
            timeout: self.request_timeout,
        }
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    missing: &mut Vec<&'static str>,
) -> String {
    match lookup(key).filter(|v| !v.is_empty()) {
        Some(value) => value,
        None => {
            missing.push(key);
            String::new()
        }
    }
}

fn duration_or_default(raw: Option<String>, key: &str, default: Duration) -> Duration {
    match raw.filter(|v| !v.is_empty()) {
        Some(raw) => match humantime::parse_duration(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(value = %raw, error = %e, "invalid {}, using default", key);
                default
            }
        },
        None => default,
    }
}

fn default_listen_addr() -> SocketAddr {
    DEFAULT_LISTEN_ADDR
        .parse()
        .expect("default listen address is valid")
}
