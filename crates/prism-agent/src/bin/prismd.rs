//! Main binary for the prismeter exporter daemon (prismd)

use clap::Parser;
use prism_agent::{
    init_logging, router, AppState, DiscoveryScheduler, ExporterConfig, Result, RouteTable,
};
use prism_api::{Cluster, CredentialProvider, EnvCredentialProvider, RoleClass};
use prism_core::MetricCatalog;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "prismd")]
#[command(about = "Prometheus exporter daemon for Nutanix Prism fleets")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Listen address override
    #[arg(long, value_name = "ADDR")]
    listen_addr: Option<SocketAddr>,

    /// Metric definition directory override
    #[arg(long, value_name = "DIR")]
    metrics_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (text, json)
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    let mut config = ExporterConfig::from_env()?;
    if let Some(listen_addr) = cli.listen_addr {
        config.listen_addr = listen_addr;
    }
    if let Some(metrics_dir) = cli.metrics_dir {
        config.metrics_dir = metrics_dir;
    }

    info!(dir = %config.metrics_dir.display(), "loading metric definitions");
    let catalog = Arc::new(MetricCatalog::load(&config.metrics_dir)?);

    let provider: Arc<dyn CredentialProvider> = Arc::new(EnvCredentialProvider::default());

    info!(cluster = %config.central_name, url = %config.central_url, "connecting to central cluster");
    let central = Arc::new(
        Cluster::connect(
            &config.central_name,
            &config.central_url,
            RoleClass::Central,
            provider.as_ref(),
            &config.client_policy(),
        )
        .await?,
    );

    let table = Arc::new(RouteTable::new());
    let scheduler = Arc::new(DiscoveryScheduler::new(
        &config,
        central,
        provider.clone(),
        catalog,
        table.clone(),
    ));

    info!("initializing clusters");
    let registered = scheduler.run_cycle().await?;
    info!(clusters = registered, "initial discovery complete");

    info!(interval = ?config.refresh_interval, "starting cluster refresh");
    scheduler.spawn();

    let app = router(AppState::new(table, provider));
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Resolve when the process receives an interrupt or termination signal.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                info!("received interrupt signal");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received interrupt signal"),
            _ = terminate.recv() => info!("received termination signal"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received interrupt signal");
    }
}
