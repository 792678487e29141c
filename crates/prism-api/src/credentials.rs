//! Credential provider contract and implementations
//!
//! Credentials are fetched per cluster and role class. The provider is the
//! seam where a secret backend plugs in; the shipped implementations read
//! the environment (fleet-wide role accounts with optional per-cluster
//! overrides) or a static in-memory map.

use async_trait::async_trait;
use prism_core::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// A `(username, secret)` pair, owned by the API client that fetched it
/// and replaced in place on refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub username: String,
    pub secret: String,
}

impl CredentialPair {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("username", &self.username)
            .field("secret", &"***")
            .finish()
    }
}

/// Role class a client is bound to: the central management endpoint or an
/// individually monitored element cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleClass {
    Central,
    Element,
}

impl RoleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleClass::Central => "central",
            RoleClass::Element => "element",
        }
    }
}

impl fmt::Display for RoleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of API credentials, opaque beyond this contract.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return the credential pair for the given cluster and role class.
    async fn credentials(&self, cluster: &str, role: RoleClass) -> Result<CredentialPair>;
}

/// Environment-backed provider.
///
/// Looks up a per-cluster override first
/// (`{PREFIX}_CLUSTER_{NAME}_USERNAME` / `_SECRET`, with the cluster name
/// upper-cased and non-alphanumerics mapped to `_`), then falls back to
/// the fleet-wide role account (`{PREFIX}_CENTRAL_USERNAME` /
/// `{PREFIX}_ELEMENT_USERNAME` and matching `_SECRET`).
pub struct EnvCredentialProvider {
    prefix: String,
}

impl EnvCredentialProvider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn pair_from(&self, key_base: &str) -> Option<CredentialPair> {
        let username = std::env::var(format!("{}_USERNAME", key_base)).ok()?;
        let secret = std::env::var(format!("{}_SECRET", key_base)).ok()?;
        if username.is_empty() || secret.is_empty() {
            return None;
        }
        Some(CredentialPair::new(username, secret))
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new("PRISM")
    }
}

/// Environment key fragment for a cluster name: upper-cased with every
/// non-alphanumeric mapped to `_`.
pub(crate) fn cluster_key_fragment(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credentials(&self, cluster: &str, role: RoleClass) -> Result<CredentialPair> {
        let override_base = format!(
            "{}_CLUSTER_{}",
            self.prefix,
            cluster_key_fragment(cluster)
        );
        if let Some(pair) = self.pair_from(&override_base) {
            return Ok(pair);
        }

        let role_base = format!("{}_{}", self.prefix, role.as_str().to_uppercase());
        self.pair_from(&role_base).ok_or_else(|| {
            Error::credentials(format!(
                "no {} credentials configured for cluster {}",
                role, cluster
            ))
        })
    }
}

/// Fixed in-memory provider, used by tests and single-account setups.
#[derive(Default)]
pub struct StaticCredentialProvider {
    fallback: Option<CredentialPair>,
    clusters: HashMap<String, CredentialPair>,
}

impl StaticCredentialProvider {
    /// Provider answering every lookup with the same pair.
    pub fn new(fallback: CredentialPair) -> Self {
        Self {
            fallback: Some(fallback),
            clusters: HashMap::new(),
        }
    }

    /// Add a per-cluster pair.
    pub fn with_cluster(mut self, cluster: impl Into<String>, pair: CredentialPair) -> Self {
        self.clusters.insert(cluster.into(), pair);
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credentials(&self, cluster: &str, _role: RoleClass) -> Result<CredentialPair> {
        self.clusters
            .get(cluster)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| Error::credentials(format!("no credentials for cluster {}", cluster)))
    }
}
