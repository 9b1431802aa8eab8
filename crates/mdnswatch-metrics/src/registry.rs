//! Latest-value gauges for network reachability.
//!
//! The registry keeps the most recent published check. Per-host series
//! persist across cycles once a host has been observed.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use mdnswatch_health::{PublishError, Publisher, Scope};

/// Point-in-time view of all gauges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkSnapshot {
    /// 1 when at least one host is up, 0 otherwise.
    pub status: u8,
    pub hosts_total: usize,
    pub hosts_up: usize,
    pub hosts_down: usize,
    /// Host name → reachable.
    pub hosts: BTreeMap<String, bool>,
}

/// Shared gauge storage read by the metrics endpoint.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<RwLock<NetworkSnapshot>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current gauge values.
    pub async fn snapshot(&self) -> NetworkSnapshot {
        self.inner.read().await.clone()
    }

    async fn update(&self, up: &[String], down: &[String]) {
        let mut snapshot = self.inner.write().await;

        snapshot.status = u8::from(!up.is_empty());
        snapshot.hosts_total = up.len() + down.len();
        snapshot.hosts_up = up.len();
        snapshot.hosts_down = down.len();

        for host in up {
            snapshot.hosts.insert(host.clone(), true);
        }
        for host in down {
            snapshot.hosts.insert(host.clone(), false);
        }
    }
}

/// Publisher writing check results into a [`MetricsRegistry`].
#[derive(Debug, Clone)]
pub struct MetricsPublisher {
    registry: MetricsRegistry,
}

impl MetricsPublisher {
    pub fn new(registry: MetricsRegistry) -> Self {
        Self { registry }
    }
}

impl Publisher for MetricsPublisher {
    async fn publish(&self, _scope: &Scope, up: &[String], down: &[String]) -> Result<(), PublishError> {
        debug!(up_hosts = up.len(), down_hosts = down.len(), "publishing check results");

        if up.is_empty() && down.is_empty() {
            debug!("no hosts in check result");
            return Ok(());
        }

        self.registry.update(up, down).await;
        Ok(())
    }
}
