//! Discovery scheduler
//!
//! Runs discovery cycles: query the central cluster, build a fresh
//! [`ScrapeTarget`] for every element cluster that has no route yet, and
//! register it. A background task repeats the cycle on the configured
//! interval; cycle failures are logged and skipped, the existing route
//! set keeps serving. Per-cluster failures (credential fetch, client
//! build) skip that cluster and leave the rest of the cycle intact.

use crate::config::ExporterConfig;
use crate::routes::{RouteTable, ScrapeTarget};
use prism_api::{
    discover_clusters, ApiVersion, ClientPolicy, Cluster, CredentialProvider, DiscoveredCluster,
    RoleClass,
};
use prism_collect::build_collectors;
use prism_core::{MetricCatalog, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Periodic re-discovery driver, owner of the route table.
pub struct DiscoveryScheduler {
    central: Arc<Cluster>,
    provider: Arc<dyn CredentialProvider>,
    catalog: Arc<MetricCatalog>,
    table: Arc<RouteTable>,
    api_version: ApiVersion,
    cluster_prefix: Option<String>,
    policy: ClientPolicy,
    interval: Duration,
}

impl DiscoveryScheduler {
    pub fn new(
        config: &ExporterConfig,
        central: Arc<Cluster>,
        provider: Arc<dyn CredentialProvider>,
        catalog: Arc<MetricCatalog>,
        table: Arc<RouteTable>,
    ) -> Self {
        Self {
            central,
            provider,
            catalog,
            table,
            api_version: config.api_version,
            cluster_prefix: config.cluster_prefix.clone(),
            policy: config.client_policy(),
            interval: config.refresh_interval,
        }
    }

    /// The route table this scheduler registers into.
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.clone()
    }

    /// Run one discovery cycle. Returns the number of newly registered
    /// routes; fails only when discovery itself fails.
    pub async fn run_cycle(&self) -> Result<usize> {
        self.central
            .refresh_credentials_if_needed(self.provider.as_ref())
            .await;

        let discovered = discover_clusters(
            &self.central,
            self.api_version,
            self.cluster_prefix.as_deref(),
        )
        .await?;

        let mut registered = 0;
        for found in discovered {
            // Existing routes are left untouched; their cluster objects
            // are not rebuilt.
            if self.table.contains(&found.name) {
                continue;
            }

            match self.build_target(&found).await {
                Ok(target) => {
                    if self.table.try_register(&found.name, target) {
                        registered += 1;
                        info!(
                            cluster = %found.name,
                            route = %format!("/metrics/{}", found.name),
                            "registered metrics endpoint"
                        );
                    }
                }
                Err(e) => {
                    warn!(cluster = %found.name, error = %e, "failed to initialize cluster");
                }
            }
        }

        Ok(registered)
    }

    async fn build_target(&self, found: &DiscoveredCluster) -> Result<Arc<ScrapeTarget>> {
        let cluster = Arc::new(
            Cluster::connect(
                &found.name,
                &found.url,
                RoleClass::Element,
                self.provider.as_ref(),
                &self.policy,
            )
            .await?,
        );
        let collectors = build_collectors(&cluster, &self.catalog)?;
        Ok(Arc::new(ScrapeTarget::new(cluster, collectors)))
    }

    /// Spawn the background refresh task. The first cycle is expected to
    /// have run during startup; the task only handles the follow-ups.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            // interval fires immediately; consume the first tick so the
            // startup cycle is not repeated right away.
            interval.tick().await;

            loop {
                interval.tick().await;
                info!("refreshing clusters");
                match self.run_cycle().await {
                    Ok(new_routes) => {
                        info!(new_routes, total_routes = self.table.len(), "clusters refreshed");
                    }
                    Err(e) => {
                        error!(error = %e, "failed to refresh clusters");
                    }
                }
            }
        })
    }
}
