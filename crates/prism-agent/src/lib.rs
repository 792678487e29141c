//! # prism-agent
//!
//! The prismeter exporter daemon. Wires together environment
//! configuration, the discovery scheduler, the route table and the axum
//! scrape server; the `prismd` binary is a thin clap wrapper around this
//! crate.

pub mod config;
pub mod routes;
pub mod scheduler;
pub mod server;

pub use config::ExporterConfig;
pub use routes::{RouteTable, ScrapeTarget};
pub use scheduler::DiscoveryScheduler;
pub use server::{router, AppState};

pub use prism_core::{Error, Result};

/// Initialize logging and tracing.
///
/// `RUST_LOG` takes precedence over the configured level; format is
/// `"text"` or `"json"`.
pub fn init_logging(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}
