//! Metric definition catalog
//!
//! The catalog is the declarative allow-list that drives metric
//! extraction: one YAML file per entity type, each an ordered list of
//! `{name, help}` records. Definitions are loaded once at startup and
//! shared read-only across every cluster's collectors.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Monitored entity types, one collector per type per cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    /// The aggregate cluster document itself
    Cluster,
    /// Hypervisor hosts
    Host,
    /// Virtual machines
    Vm,
    /// Storage containers
    StorageContainer,
}

impl EntityType {
    /// All entity types, in collector registration order.
    pub const ALL: [EntityType; 4] = [
        EntityType::StorageContainer,
        EntityType::Cluster,
        EntityType::Host,
        EntityType::Vm,
    ];

    /// Prometheus subsystem name, also the allow-list file stem.
    pub fn subsystem(&self) -> &'static str {
        match self {
            EntityType::Cluster => "cluster",
            EntityType::Host => "host",
            EntityType::Vm => "vm",
            EntityType::StorageContainer => "storage_container",
        }
    }

    /// Label schema for gauges of this entity type.
    ///
    /// Aggregate-cluster metrics carry the cluster name only; per-instance
    /// metrics add an entity-specific instance label.
    pub fn label_names(&self) -> &'static [&'static str] {
        match self {
            EntityType::Cluster => &["cluster_name"],
            EntityType::Host => &["cluster_name", "host_name"],
            EntityType::Vm => &["cluster_name", "vm_name"],
            EntityType::StorageContainer => &["cluster_name", "container_name"],
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.subsystem())
    }
}

/// One metric in an allow-list file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Metric name, matched against normalized flattened keys
    pub name: String,
    /// Help text for the exposition output
    pub help: String,
}

impl MetricDefinition {
    /// Create a definition in place (used by tests and embedded defaults).
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
        }
    }
}

/// Read-only metric definition source for all entity types.
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    definitions: HashMap<EntityType, Vec<MetricDefinition>>,
}

impl MetricCatalog {
    /// Load the catalog from a directory holding one `<subsystem>.yaml`
    /// file per entity type. Missing or malformed files fail the load;
    /// the catalog is a startup prerequisite.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut definitions = HashMap::new();

        for entity in EntityType::ALL {
            let path = dir.join(format!("{}.yaml", entity.subsystem()));
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::catalog(format!(
                    "failed to read definitions for {} from {}: {}",
                    entity,
                    path.display(),
                    e
                ))
            })?;
            definitions.insert(entity, parse_definitions(&content)?);
        }

        Ok(Self { definitions })
    }

    /// Build a catalog from in-memory definitions.
    pub fn from_definitions(definitions: HashMap<EntityType, Vec<MetricDefinition>>) -> Self {
        Self { definitions }
    }

    /// Definitions for one entity type; empty when none were loaded.
    pub fn definitions(&self, entity: EntityType) -> &[MetricDefinition] {
        self.definitions
            .get(&entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Parse one allow-list document.
pub fn parse_definitions(yaml: &str) -> Result<Vec<MetricDefinition>> {
    let definitions: Vec<MetricDefinition> = serde_yaml::from_str(yaml)?;
    Ok(definitions)
}
