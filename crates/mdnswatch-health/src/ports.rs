//! Seams between the engine and its collaborators.
//!
//! ```text
//! Discovery  ← consumed by Prober (one presence query per host)
//! Probe      ← consumed by Check (implemented by Prober)
//! Publisher  ← consumed by Check (one call per successful cycle)
//! ```

use std::future::Future;
use std::time::Duration;

use crate::error::{DiscoveryError, ProbeError, PublishError};
use crate::scope::Scope;

/// Reachability classification of one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostState {
    /// Not classified. Never published; aborts the cycle.
    Unknown,
    Up,
    Down,
}

impl std::fmt::Display for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostState::Unknown => f.write_str("unknown"),
            HostState::Up => f.write_str("up"),
            HostState::Down => f.write_str("down"),
        }
    }
}

/// Result of probing one host in one cycle.
#[derive(Debug)]
pub struct ProbeOutcome {
    pub host: String,
    pub state: HostState,
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    pub fn from_result(host: String, result: Result<HostState, ProbeError>) -> Self {
        match result {
            Ok(state) => Self {
                host,
                state,
                error: None,
            },
            Err(error) => Self {
                host,
                state: HostState::Unknown,
                error: Some(error),
            },
        }
    }
}

/// Name-presence capability of a discovery protocol.
pub trait Discovery: Send + Sync + 'static {
    /// Resolve `host` within `scope`.
    ///
    /// When the scope ends first the backend must return
    /// [`DiscoveryError::Interrupted`]; callers inspect the scope itself to
    /// tell an elapsed deadline from other failures.
    fn resolve_presence(
        &self,
        scope: &Scope,
        host: &str,
    ) -> impl Future<Output = Result<(), DiscoveryError>> + Send;
}

/// One bounded reachability probe.
pub trait Probe: Send + Sync + 'static {
    fn probe(
        &self,
        scope: &Scope,
        host: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<HostState, ProbeError>> + Send;
}

/// Destination for completed check results.
pub trait Publisher: Send + Sync + 'static {
    fn publish(
        &self,
        scope: &Scope,
        up: &[String],
        down: &[String],
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}
