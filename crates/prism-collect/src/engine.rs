//! Allow-list gauge engine
//!
//! The engine is the shared extraction core every entity collector embeds:
//! it owns one `GaugeVec` per allow-listed metric name and gates every
//! observation through the allow-list. A gauge must exist before a value
//! can be set for it; keys that normalize to anything outside the
//! allow-list are silently dropped, never created ad hoc.

use prism_core::{
    coerce_numeric, normalize_key, EntityType, Error, MetricDefinition, Result, NAMESPACE,
};
use prometheus::{GaugeVec, Opts, Registry};
use serde_json::Value;
use std::collections::HashMap;

/// Gauge set for one entity type, driven by its allow-list.
pub struct MetricEngine {
    entity: EntityType,
    metrics: HashMap<String, GaugeVec>,
}

impl MetricEngine {
    /// Build one gauge per definition, named
    /// `{namespace}_{subsystem}_{name}` with the entity's label schema.
    pub fn new(entity: EntityType, definitions: &[MetricDefinition]) -> Result<Self> {
        let mut metrics = HashMap::new();

        for definition in definitions {
            let opts = Opts::new(definition.name.clone(), definition.help.clone())
                .namespace(NAMESPACE)
                .subsystem(entity.subsystem());
            let gauge = GaugeVec::new(opts, entity.label_names()).map_err(|e| {
                Error::registry(format!(
                    "invalid metric definition {}: {}",
                    definition.name, e
                ))
            })?;
            metrics.insert(definition.name.clone(), gauge);
        }

        Ok(Self { entity, metrics })
    }

    /// Entity type this engine serves.
    pub fn entity(&self) -> EntityType {
        self.entity
    }

    /// Number of allow-listed metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Register every gauge into the given per-cluster registry.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        for gauge in self.metrics.values() {
            registry
                .register(Box::new(gauge.clone()))
                .map_err(|e| Error::registry(format!("failed to register metric: {}", e)))?;
        }
        Ok(())
    }

    /// Record one extracted key: normalize it, look it up in the
    /// allow-list, and set the gauge from the coerced value. Keys outside
    /// the allow-list are dropped.
    pub fn observe(&self, key: &str, labels: &[&str], value: &Value) {
        let normalized = normalize_key(key);
        if let Some(gauge) = self.metrics.get(&normalized) {
            gauge.with_label_values(labels).set(coerce_numeric(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definitions() -> Vec<MetricDefinition> {
        vec![MetricDefinition::new(
            "storage_usage_bytes",
            "Used bytes in the container",
        )]
    }

    fn sample_count(registry: &Registry) -> usize {
        registry
            .gather()
            .iter()
            .map(|family| family.get_metric().len())
            .sum()
    }

    #[test]
    fn test_allow_listed_key_sets_gauge() {
        let engine = MetricEngine::new(EntityType::StorageContainer, &definitions()).unwrap();
        let registry = Registry::new();
        engine.register(&registry).unwrap();

        engine.observe("storage.usage_bytes", &["pe-01", "ctr1"], &json!(100));

        let families = registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "nutanix_storage_container_storage_usage_bytes")
            .expect("family should be exported");
        let metric = &family.get_metric()[0];
        assert_eq!(metric.get_gauge().get_value(), 100.0);
    }

    #[test]
    fn test_unlisted_key_never_creates_a_gauge_value() {
        let engine = MetricEngine::new(EntityType::StorageContainer, &definitions()).unwrap();
        let registry = Registry::new();
        engine.register(&registry).unwrap();

        engine.observe("replication_factor", &["pe-01", "ctr1"], &json!(2));
        engine.observe("storage.free_bytes", &["pe-01", "ctr1"], &json!(7));

        assert_eq!(sample_count(&registry), 0);
    }

    #[test]
    fn test_observe_coerces_values() {
        let engine = MetricEngine::new(
            EntityType::Vm,
            &[MetricDefinition::new("power_state", "VM power state")],
        )
        .unwrap();
        let registry = Registry::new();
        engine.register(&registry).unwrap();

        engine.observe("power_state", &["pe-01", "vm-1"], &json!("on"));

        let families = registry.gather();
        assert_eq!(families[0].get_metric()[0].get_gauge().get_value(), 1.0);
    }
}
