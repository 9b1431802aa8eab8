//! Probe gate: bounds how many probes run at once.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{ConfigError, ConfigResult};
use crate::scope::{Scope, ScopeEnd};

/// Counting admission gate shared by all probes.
#[derive(Debug, Clone)]
pub struct ProbeGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

/// A unit of admission. Released when dropped.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ProbeGate {
    /// Create a gate admitting at most `limit` concurrent probes.
    pub fn new(limit: usize) -> ConfigResult<Self> {
        if limit == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    /// Wait for a permit, giving up as soon as `scope` ends.
    ///
    /// A scope that has already ended never receives a permit, even if one
    /// is free.
    pub async fn acquire(&self, scope: &Scope) -> Result<GatePermit, ScopeEnd> {
        if let Some(end) = scope.end() {
            return Err(end);
        }

        tokio::select! {
            biased;
            end = scope.done() => Err(end),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                // The semaphore is never closed.
                let permit = permit.map_err(|_| ScopeEnd::Cancelled)?;
                Ok(GatePermit { _permit: permit })
            }
        }
    }

    /// Return a permit to the gate.
    pub fn release(&self, permit: GatePermit) {
        drop(permit);
    }

    /// Configured concurrency limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }
}
