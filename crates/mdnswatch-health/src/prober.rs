//! Prober: one gated, time-bounded presence query per host.
//!
//! Classification precedence after the query returns:
//!
//! 1. caller's scope ended → [`ProbeError::Interrupted`]
//! 2. query succeeded → [`HostState::Up`]
//! 3. per-probe timeout elapsed → [`HostState::Down`]
//! 4. anything else → [`ProbeError::Discovery`]

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{DiscoveryError, ProbeError};
use crate::gate::ProbeGate;
use crate::ports::{Discovery, HostState, Probe};
use crate::scope::{Scope, ScopeEnd};

/// Probes hosts through a [`Discovery`] backend under a [`ProbeGate`].
pub struct Prober<D> {
    discovery: Arc<D>,
    gate: ProbeGate,
}

impl<D: Discovery> Prober<D> {
    pub fn new(discovery: Arc<D>, gate: ProbeGate) -> Self {
        Self { discovery, gate }
    }

    /// The gate bounding this prober.
    pub fn gate(&self) -> &ProbeGate {
        &self.gate
    }
}

impl<D: Discovery> Probe for Prober<D> {
    async fn probe(
        &self,
        scope: &Scope,
        host: &str,
        timeout: Duration,
    ) -> Result<HostState, ProbeError> {
        let permit = self
            .gate
            .acquire(scope)
            .await
            .map_err(ProbeError::Interrupted)?;

        let bounded = scope.with_timeout(timeout);
        let result = tokio::select! {
            biased;
            result = self.discovery.resolve_presence(&bounded, host) => result,
            end = bounded.done() => Err(DiscoveryError::Interrupted(end)),
        };
        bounded.cancel();
        self.gate.release(permit);

        classify(scope, &bounded, host, result)
    }
}

fn classify(
    outer: &Scope,
    bounded: &Scope,
    host: &str,
    result: Result<(), DiscoveryError>,
) -> Result<HostState, ProbeError> {
    if let Some(end) = outer.end() {
        debug!(%host, reason = %end, "probe interrupted by caller");
        return Err(ProbeError::Interrupted(end));
    }

    let err = match result {
        Ok(()) => {
            debug!(%host, "host answered");
            return Ok(HostState::Up);
        }
        Err(err) => err,
    };

    let timed_out = matches!(err, DiscoveryError::Interrupted(ScopeEnd::DeadlineExceeded))
        || bounded
            .deadline()
            .is_some_and(|deadline| tokio::time::Instant::now() >= deadline);
    if timed_out {
        debug!(%host, "no answer within probe timeout");
        return Ok(HostState::Down);
    }

    Err(ProbeError::Discovery(err))
}
