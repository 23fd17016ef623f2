//! Metrics Adapters
//!
//! Prometheus counters and histograms for the position workflow, exported
//! as a node-exporter textfile at the end of each run.

pub mod prometheus;

pub use prometheus::MetricsRegistry;
