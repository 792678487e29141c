//! # prism-collect
//!
//! Metric production for prismeter: the allow-list gauge engine and the
//! per-entity collectors that map upstream JSON shapes onto it. One
//! collector set is built per cluster, registered into that cluster's
//! registry, and driven once per scrape.

pub mod collector;
pub mod engine;

pub use collector::{build_collectors, EntityCollector, Traversal};
pub use engine::MetricEngine;
