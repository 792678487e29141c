//! # prism-api
//!
//! Upstream API plumbing for prismeter: the credential provider contract,
//! the credential-aware HTTP client with its two path conventions, the
//! per-cluster handle with the credential-staleness state machine, and
//! element-cluster discovery against the central management endpoint.

pub mod client;
pub mod cluster;
pub mod credentials;
pub mod discovery;

pub use client::{ClientPolicy, PathStyle, PrismClient, RequestParams};
pub use cluster::Cluster;
pub use credentials::{
    CredentialPair, CredentialProvider, EnvCredentialProvider, RoleClass,
    StaticCredentialProvider,
};
pub use discovery::{discover_clusters, ApiVersion, DiscoveredCluster};

pub use reqwest::Method;
