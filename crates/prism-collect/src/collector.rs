//! Entity collectors
//!
//! One collector per monitored entity type per cluster. Each scrape
//! triggers `collect()`: a single GET against the entity's list endpoint
//! under the client's bounded timeout, then a traversal of the response
//! that feeds the allow-list engine. Any client-level error, including
//! the known-stale fast-fail, is logged and yields zero updates for that
//! scrape; the next scrape starts fresh.
//!
//! The entity shapes differ, the engine does not; what varies is the
//! traversal strategy supplied at construction.

use crate::engine::MetricEngine;
use prism_api::Cluster;
use prism_core::{flatten, EntityType, MetricCatalog, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

const CLUSTER_PATH: &str = "/v2.0/cluster/";
const HOSTS_PATH: &str = "/v2.0/hosts/";
const VMS_PATH: &str = "/v2.0/vms/";
const STORAGE_CONTAINERS_PATH: &str = "/v2.0/storage_containers/";

/// Sub-document of a storage container entry that carries its metrics.
const USAGE_BLOCK_FIELD: &str = "usage_stats";

/// Instance label when an entity carries no usable `name` field.
const UNKNOWN_INSTANCE: &str = "unknown";

/// Instance label for metrics extracted from a response metadata block.
const METADATA_INSTANCE: &str = "N/A";

/// How a response document maps onto entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// The document itself is the single entity: its top-level fields
    /// plus one level of nested sub-documents, nothing deeper.
    SingleDocument,
    /// An `entities` list whose elements are flattened at full depth.
    EntityList,
    /// An `entities` list where only the immediate fields of one known
    /// sub-document are of interest.
    UsageBlock { field: &'static str },
}

/// Collector for one entity type on one cluster.
pub struct EntityCollector {
    cluster: Arc<Cluster>,
    engine: MetricEngine,
    path: &'static str,
    traversal: Traversal,
}

impl EntityCollector {
    fn new(
        cluster: Arc<Cluster>,
        catalog: &MetricCatalog,
        entity: EntityType,
        path: &'static str,
        traversal: Traversal,
    ) -> Result<Self> {
        let engine = MetricEngine::new(entity, catalog.definitions(entity))?;
        engine.register(cluster.registry())?;

        Ok(Self {
            cluster,
            engine,
            path,
            traversal,
        })
    }

    /// Aggregate-cluster collector: the response document is the entity.
    pub fn cluster_aggregate(cluster: Arc<Cluster>, catalog: &MetricCatalog) -> Result<Self> {
        Self::new(
            cluster,
            catalog,
            EntityType::Cluster,
            CLUSTER_PATH,
            Traversal::SingleDocument,
        )
    }

    /// Hypervisor host collector.
    pub fn hosts(cluster: Arc<Cluster>, catalog: &MetricCatalog) -> Result<Self> {
        Self::new(
            cluster,
            catalog,
            EntityType::Host,
            HOSTS_PATH,
            Traversal::EntityList,
        )
    }

    /// Virtual machine collector.
    pub fn vms(cluster: Arc<Cluster>, catalog: &MetricCatalog) -> Result<Self> {
        Self::new(
            cluster,
            catalog,
            EntityType::Vm,
            VMS_PATH,
            Traversal::EntityList,
        )
    }

    /// Storage container collector: only the usage statistics block.
    pub fn storage_containers(cluster: Arc<Cluster>, catalog: &MetricCatalog) -> Result<Self> {
        Self::new(
            cluster,
            catalog,
            EntityType::StorageContainer,
            STORAGE_CONTAINERS_PATH,
            Traversal::UsageBlock {
                field: USAGE_BLOCK_FIELD,
            },
        )
    }

    /// Entity type this collector serves.
    pub fn entity(&self) -> EntityType {
        self.engine.entity()
    }

    /// Per-scrape production: fetch and update the registered gauges.
    pub async fn collect(&self) {
        let data = match self.cluster.fetch(self.path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    cluster = %self.cluster.name(),
                    entity = %self.entity(),
                    category = e.category(),
                    error = %e,
                    "error fetching entity data"
                );
                return;
            }
        };

        self.update(&data);
    }

    fn update(&self, data: &Value) {
        match self.traversal {
            Traversal::SingleDocument => self.update_single_document(data),
            Traversal::EntityList => {
                self.update_metadata(data);
                self.update_entity_list(data);
            }
            Traversal::UsageBlock { field } => {
                self.update_metadata(data);
                self.update_usage_blocks(data, field);
            }
        }
    }

    /// Aggregate document: top-level scalars plus the immediate fields of
    /// one level of sub-documents. Deeper nesting is ignored.
    fn update_single_document(&self, data: &Value) {
        let document = match data.as_object() {
            Some(document) => document,
            None => return,
        };
        let labels = [self.cluster.name()];

        for (key, value) in document {
            match value {
                Value::Object(nested) => {
                    for (sub_key, sub_value) in nested {
                        if sub_value.is_object() {
                            continue;
                        }
                        let child_key = format!("{}_{}", key, sub_key);
                        self.engine.observe(&child_key, &labels, sub_value);
                    }
                }
                other => self.engine.observe(key, &labels, other),
            }
        }
    }

    /// Entity list: every element flattened at full depth, labeled with
    /// the entity name (or the sentinel when it has none).
    fn update_entity_list(&self, data: &Value) {
        let entities = match data.get("entities").and_then(Value::as_array) {
            Some(entities) => entities,
            None => return,
        };

        for entity in entities {
            let entity = match entity.as_object() {
                Some(entity) => entity,
                None => continue,
            };
            let instance = entity
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_INSTANCE);
            let labels = [self.cluster.name(), instance];

            for (key, value) in flatten("", entity) {
                self.engine.observe(&key, &labels, &value);
            }
        }
    }

    /// Entity list where only one known sub-document matters; its
    /// immediate fields are read without any deep flatten.
    fn update_usage_blocks(&self, data: &Value, field: &str) {
        let entities = match data.get("entities").and_then(Value::as_array) {
            Some(entities) => entities,
            None => return,
        };

        for entity in entities {
            let entity = match entity.as_object() {
                Some(entity) => entity,
                None => continue,
            };
            let instance = entity
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_INSTANCE);
            let labels = [self.cluster.name(), instance];

            let block = match entity.get(field).and_then(Value::as_object) {
                Some(block) => block,
                None => continue,
            };
            for (key, value) in block {
                if value.is_object() {
                    continue;
                }
                self.engine.observe(key, &labels, value);
            }
        }
    }

    /// Top-level metadata block of entity list responses, labeled with
    /// the `"N/A"` instance.
    fn update_metadata(&self, data: &Value) {
        let metadata = match data.get("metadata").and_then(Value::as_object) {
            Some(metadata) => metadata,
            None => return,
        };
        let labels = [self.cluster.name(), METADATA_INSTANCE];

        for (key, value) in flatten("", metadata) {
            self.engine.observe(&key, &labels, &value);
        }
    }
}

/// Build the full collector set for one cluster, registering every gauge
/// into the cluster's registry.
pub fn build_collectors(
    cluster: &Arc<Cluster>,
    catalog: &MetricCatalog,
) -> Result<Vec<EntityCollector>> {
    Ok(vec![
        EntityCollector::storage_containers(cluster.clone(), catalog)?,
        EntityCollector::cluster_aggregate(cluster.clone(), catalog)?,
        EntityCollector::hosts(cluster.clone(), catalog)?,
        EntityCollector::vms(cluster.clone(), catalog)?,
    ])
}
