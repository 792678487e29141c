//! Route table
//!
//! Maps cluster names to their scrape targets. The table is owned by the
//! scheduler and shared with the serving path as an `Arc`; registration
//! is idempotent and entries are never removed, so routes for clusters
//! that later disappear keep serving their last-built target.

use dashmap::DashMap;
use prism_api::Cluster;
use prism_collect::EntityCollector;
use std::sync::Arc;

/// Everything a scrape of one route needs: the cluster handle and its
/// collector set.
pub struct ScrapeTarget {
    pub cluster: Arc<Cluster>,
    pub collectors: Vec<EntityCollector>,
}

impl ScrapeTarget {
    pub fn new(cluster: Arc<Cluster>, collectors: Vec<EntityCollector>) -> Self {
        Self {
            cluster,
            collectors,
        }
    }
}

/// Concurrency-safe, monotonically growing route registration table.
#[derive(Default)]
pub struct RouteTable {
    routes: DashMap<String, Arc<ScrapeTarget>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target for a route, unless that exact route already
    /// exists. Returns whether the registration took place; an existing
    /// entry is left untouched.
    pub fn try_register(&self, name: &str, target: Arc<ScrapeTarget>) -> bool {
        match self.routes.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(target);
                true
            }
        }
    }

    /// Whether a route is already registered.
    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Target for a registered route.
    pub fn get(&self, name: &str) -> Option<Arc<ScrapeTarget>> {
        self.routes.get(name).map(|entry| entry.value().clone())
    }

    /// Registered cluster names, sorted for stable presentation.
    pub fn cluster_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_api::{ClientPolicy, CredentialPair, RoleClass, StaticCredentialProvider};

    async fn target(name: &str) -> Arc<ScrapeTarget> {
        let provider = StaticCredentialProvider::new(CredentialPair::new("svc", "secret"));
        let cluster = Arc::new(
            Cluster::connect(
                name,
                "https://10.0.0.4:9440",
                RoleClass::Element,
                &provider,
                &ClientPolicy::default(),
            )
            .await
            .unwrap(),
        );
        Arc::new(ScrapeTarget::new(cluster, Vec::new()))
    }

    #[tokio::test]
    async fn test_try_register_is_idempotent() {
        let table = RouteTable::new();
        let first = target("pe-01").await;
        let second = target("pe-01").await;

        assert!(table.try_register("pe-01", first.clone()));
        assert!(!table.try_register("pe-01", second));
        assert_eq!(table.len(), 1);

        // The original registration must survive the second attempt.
        let registered = table.get("pe-01").unwrap();
        assert!(Arc::ptr_eq(&registered, &first));
    }

    #[tokio::test]
    async fn test_cluster_names_are_sorted() {
        let table = RouteTable::new();
        table.try_register("pe-02", target("pe-02").await);
        table.try_register("pe-01", target("pe-01").await);

        assert_eq!(table.cluster_names(), vec!["pe-01", "pe-02"]);
    }

    #[tokio::test]
    async fn test_unknown_route_lookup() {
        let table = RouteTable::new();
        assert!(table.get("nope").is_none());
        assert!(!table.contains("nope"));
        assert!(table.is_empty());
    }
}
