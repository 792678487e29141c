//! Per-cluster handle and the credential-staleness state machine
//!
//! A [`Cluster`] bundles the identity of one monitored cluster with its
//! API client and its own Prometheus registry. Identity fields are
//! immutable after construction; the only mutable state is the staleness
//! flag, guarded by a mutex that is also held across the refresh call so
//! concurrent scrapes serialize behind one refresh.
//!
//! The flag is an idempotent signal, not a queue: many collectors may
//! observe a 401 on the same scrape, only the first observer under the
//! lock flips it (and logs). While the flag is set, every fetch fails
//! fast with a known-stale error instead of issuing a doomed call.

use crate::client::{ClientPolicy, PrismClient, RequestParams};
use crate::credentials::{CredentialProvider, RoleClass};
use prism_core::{Error, Result};
use prometheus::Registry;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One monitored cluster: identity, API client, metric registry,
/// staleness flag.
pub struct Cluster {
    name: String,
    url: String,
    client: PrismClient,
    registry: Registry,
    stale: Mutex<bool>,
}

impl Cluster {
    /// Create a cluster handle, fetching its credentials from the
    /// provider and building the role-appropriate client.
    pub async fn connect(
        name: impl Into<String>,
        url: impl Into<String>,
        role: RoleClass,
        provider: &dyn CredentialProvider,
        policy: &ClientPolicy,
    ) -> Result<Self> {
        let name = name.into();
        let url = url.into();

        let credentials = provider.credentials(&name, role).await?;
        let client = PrismClient::new(&name, &url, role, credentials, policy)?;

        Ok(Self {
            name,
            url,
            client,
            registry: Registry::new(),
            stale: Mutex::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The per-cluster metric registry collectors register into.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Whether credentials are currently marked stale.
    pub async fn credentials_stale(&self) -> bool {
        *self.stale.lock().await
    }

    /// Mark the current credentials as rejected by the upstream.
    /// First observer under the lock flips the flag and logs.
    pub async fn mark_stale(&self) {
        let mut stale = self.stale.lock().await;
        if !*stale {
            warn!(cluster = %self.name, "marking stale credentials for refresh");
            *stale = true;
        }
    }

    /// Scrape-time refresh hook. Holds the lock across the refresh call;
    /// success clears the flag, failure leaves it set and the cluster
    /// keeps operating with the old credentials until the next scrape.
    pub async fn refresh_credentials_if_needed(&self, provider: &dyn CredentialProvider) {
        let mut stale = self.stale.lock().await;
        if !*stale {
            return;
        }

        match self.client.refresh_credentials(provider).await {
            Ok(()) => {
                *stale = false;
                info!(cluster = %self.name, "credentials refreshed");
            }
            Err(e) => {
                warn!(cluster = %self.name, error = %e, "failed to refresh credentials");
            }
        }
    }

    /// GET an action path and decode the JSON body.
    pub async fn fetch(&self, path: &str) -> Result<Value> {
        self.fetch_with(Method::GET, path, &RequestParams::default())
            .await
    }

    /// Issue a request under the staleness gate: fails fast while the
    /// flag is set, and trips the flag when the upstream answers 401/403.
    pub async fn fetch_with(
        &self,
        method: Method,
        path: &str,
        params: &RequestParams,
    ) -> Result<Value> {
        if self.credentials_stale().await {
            return Err(Error::stale_credentials(&self.name));
        }

        match self.client.fetch_json(method, path, params).await {
            Err(e) if e.is_unauthorized() => {
                self.mark_stale().await;
                Err(e)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialPair, StaticCredentialProvider};
    use std::sync::Arc;

    async fn test_cluster() -> Cluster {
        let provider = StaticCredentialProvider::new(CredentialPair::new("svc", "secret"));
        Cluster::connect(
            "pe-01",
            "https://10.0.0.4:9440",
            RoleClass::Element,
            &provider,
            &ClientPolicy::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_mark_stale_flips_once() {
        let cluster = Arc::new(test_cluster().await);

        let a = tokio::spawn({
            let cluster = cluster.clone();
            async move { cluster.mark_stale().await }
        });
        let b = tokio::spawn({
            let cluster = cluster.clone();
            async move { cluster.mark_stale().await }
        });
        let (ra, rb) = tokio::join!(a, b);
        ra.unwrap();
        rb.unwrap();

        assert!(cluster.credentials_stale().await);
    }

    #[tokio::test]
    async fn test_fetch_fails_fast_while_stale() {
        let cluster = test_cluster().await;
        cluster.mark_stale().await;

        // No listener at the cluster URL; a fast-fail proves no request
        // was attempted.
        let err = cluster.fetch("/v2.0/hosts/").await.unwrap_err();
        assert!(err.is_stale());
    }

    #[tokio::test]
    async fn test_successful_refresh_clears_flag() {
        let cluster = test_cluster().await;
        cluster.mark_stale().await;

        let provider = StaticCredentialProvider::new(CredentialPair::new("svc", "rotated"));
        cluster.refresh_credentials_if_needed(&provider).await;

        assert!(!cluster.credentials_stale().await);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_flag_set() {
        let cluster = test_cluster().await;
        cluster.mark_stale().await;

        // Provider with no credentials at all: refresh must fail.
        let provider = StaticCredentialProvider::default();
        cluster.refresh_credentials_if_needed(&provider).await;

        assert!(cluster.credentials_stale().await);
    }

    #[tokio::test]
    async fn test_refresh_is_noop_when_fresh() {
        let cluster = test_cluster().await;
        let provider = StaticCredentialProvider::default();

        // Must not touch the provider (which would fail) when the flag is
        // clear.
        cluster.refresh_credentials_if_needed(&provider).await;
        assert!(!cluster.credentials_stale().await);
    }

    async fn serve_status(status: axum::http::StatusCode) -> std::net::SocketAddr {
        use axum::routing::get;

        let app = axum::Router::new().route(
            "/PrismGateway/services/rest/v2.0/hosts/",
            get(move || async move { (status, "{}") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn cluster_for(addr: std::net::SocketAddr) -> Cluster {
        let provider = StaticCredentialProvider::new(CredentialPair::new("svc", "secret"));
        Cluster::connect(
            "pe-01",
            format!("http://{}", addr),
            RoleClass::Element,
            &provider,
            &ClientPolicy::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_upstream_marks_stale_once() {
        let addr = serve_status(axum::http::StatusCode::UNAUTHORIZED).await;
        let cluster = Arc::new(cluster_for(addr).await);

        // Two concurrent fetches both hit the 401; the flag flips exactly
        // once and both calls fail.
        let a = tokio::spawn({
            let cluster = cluster.clone();
            async move { cluster.fetch("/v2.0/hosts/").await }
        });
        let b = tokio::spawn({
            let cluster = cluster.clone();
            async move { cluster.fetch("/v2.0/hosts/").await }
        });
        let (ra, rb) = tokio::join!(a, b);
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert!(ra.is_err() && rb.is_err());
        assert!(cluster.credentials_stale().await);

        // Later fetches fast-fail without touching the upstream.
        let err = cluster.fetch("/v2.0/hosts/").await.unwrap_err();
        assert!(err.is_stale());
    }

    #[tokio::test]
    async fn test_non_auth_errors_do_not_mark_stale() {
        let addr = serve_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR).await;
        let cluster = cluster_for(addr).await;

        let err = cluster.fetch("/v2.0/hosts/").await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        assert!(!cluster.credentials_stale().await);
    }

    #[tokio::test]
    async fn test_successful_fetch_decodes_body() {
        let addr = serve_status(axum::http::StatusCode::OK).await;
        let cluster = cluster_for(addr).await;

        let body = cluster.fetch("/v2.0/hosts/").await.unwrap();
        assert!(body.is_object());
    }
}
