//! Element-cluster discovery against the central management endpoint
//!
//! The central API ships two incompatible response schemas selected by a
//! version flag: v4 answers a plain GET with `{data: [...]}` where the
//! address hides under `network.externalAddress.ipv4.value`, v3 answers a
//! list-query POST with `{entities: [...]}` where the pieces live under
//! `spec.name` and `status.resources.network.external_ip`. Both normalize
//! to `(name, ip)` pairs before the shared post-processing.
//!
//! Discovery is best-effort per entry: a malformed record is skipped, the
//! call as a whole fails only when the request itself or the top-level
//! shape is unusable.

use crate::client::RequestParams;
use crate::cluster::Cluster;
use prism_core::{Error, Result};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

const V4_CLUSTERS_PATH: &str = "/api/clustermgmt/v4.0.b1/config/clusters";
const V3_CLUSTERS_PATH: &str = "/api/nutanix/v3/clusters/list";
const V3_PAGE_LENGTH: u64 = 100;

/// Element clusters expose their gateway on this port.
const ELEMENT_PORT: u16 = 9440;

/// Placeholder name the upstream reports for unconfigured entries.
const UNNAMED: &str = "Unnamed";

/// Central API schema version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiVersion {
    V3,
    #[default]
    V4,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V3 => "v3",
            ApiVersion::V4 => "v4",
        }
    }
}

impl std::str::FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "v3" => Ok(ApiVersion::V3),
            "v4" => Ok(ApiVersion::V4),
            other => Err(Error::config(format!("unknown API version: {}", other))),
        }
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered element cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCluster {
    pub name: String,
    pub url: String,
}

/// Query the central cluster for all registered element clusters.
pub async fn discover_clusters(
    central: &Cluster,
    version: ApiVersion,
    prefix: Option<&str>,
) -> Result<Vec<DiscoveredCluster>> {
    let response = match version {
        ApiVersion::V4 => central.fetch(V4_CLUSTERS_PATH).await?,
        ApiVersion::V3 => {
            let params = RequestParams {
                body: Some(json!({
                    "kind": "cluster",
                    "length": V3_PAGE_LENGTH,
                    "offset": 0,
                })),
                ..Default::default()
            };
            central
                .fetch_with(Method::POST, V3_CLUSTERS_PATH, &params)
                .await?
        }
    };

    let entries = match version {
        ApiVersion::V4 => parse_v4_clusters(&response)?,
        ApiVersion::V3 => parse_v3_clusters(&response)?,
    };

    Ok(select_clusters(entries, prefix))
}

/// Parse the v4 schema: `{data: [{name, network.externalAddress.ipv4.value}]}`.
fn parse_v4_clusters(response: &Value) -> Result<Vec<(String, String)>> {
    let data = response
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::discovery("unexpected response format for v4"))?;

    let mut clusters = Vec::new();
    for entry in data {
        let name = match entry.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => {
                debug!("skipping cluster entry without a name");
                continue;
            }
        };
        let ip = match entry
            .pointer("/network/externalAddress/ipv4/value")
            .and_then(Value::as_str)
        {
            Some(ip) => ip,
            None => {
                debug!(cluster = name, "skipping cluster entry without an external address");
                continue;
            }
        };
        clusters.push((name.to_string(), ip.to_string()));
    }
    Ok(clusters)
}

/// Parse the v3 schema: `{entities: [{spec.name, status.resources.network.external_ip}]}`.
fn parse_v3_clusters(response: &Value) -> Result<Vec<(String, String)>> {
    let entities = response
        .get("entities")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::discovery("unexpected response format for v3"))?;

    let mut clusters = Vec::new();
    for entity in entities {
        let name = match entity.pointer("/spec/name").and_then(Value::as_str) {
            Some(name) => name,
            None => {
                debug!("skipping cluster entity without a spec name");
                continue;
            }
        };
        let ip = match entity
            .pointer("/status/resources/network/external_ip")
            .and_then(Value::as_str)
        {
            Some(ip) => ip,
            None => {
                debug!(cluster = name, "skipping cluster entity without an external ip");
                continue;
            }
        };
        clusters.push((name.to_string(), ip.to_string()));
    }
    Ok(clusters)
}

/// Shared, version-independent post-processing: drop unnamed entries,
/// apply the optional prefix filter, build the element gateway URL.
fn select_clusters(
    entries: Vec<(String, String)>,
    prefix: Option<&str>,
) -> Vec<DiscoveredCluster> {
    let mut clusters = Vec::new();
    for (name, ip) in entries {
        if name == UNNAMED {
            continue;
        }
        if let Some(prefix) = prefix {
            if !name.starts_with(prefix) {
                debug!(cluster = %name, "skipping cluster outside the configured prefix");
                continue;
            }
        }

        let url = format!("https://{}:{}", ip, ELEMENT_PORT);
        info!(cluster = %name, %url, "found cluster");
        clusters.push(DiscoveredCluster { name, url });
    }
    clusters
}
