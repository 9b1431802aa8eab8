//! mdnswatch-metrics: reachability gauges for Prometheus scraping.
//!
//! # Architecture
//!
//! ```text
//! MetricsPublisher (implements Publisher)
//!   └── update() → MetricsRegistry (latest NetworkSnapshot)
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for the metrics endpoint
//! ```

pub mod prometheus;
pub mod registry;

pub use prometheus::{CONTENT_TYPE, render_prometheus};
pub use registry::{MetricsPublisher, MetricsRegistry, NetworkSnapshot};
