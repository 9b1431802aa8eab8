//! Probe timing and host list settings.

use std::time::Duration;

use crate::error::ConfigError;

/// Settings consumed by the engine at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Time between cycle starts.
    pub interval: Duration,
    /// Budget for a single host's answer.
    pub timeout: Duration,
    /// Optional bound on a whole cycle.
    pub cycle_timeout: Option<Duration>,
    /// Maximum probes in flight.
    pub concurrency: usize,
    /// Hosts probed every cycle.
    pub hosts: Vec<String>,
}

impl ProbeConfig {
    /// Check every constraint, collecting all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.interval.is_zero() {
            errors.push(ConfigError::ZeroInterval);
        }
        if self.timeout.is_zero() {
            errors.push(ConfigError::ZeroTimeout);
        }
        if self.interval <= self.timeout {
            errors.push(ConfigError::IntervalNotAboveTimeout {
                interval: self.interval,
                timeout: self.timeout,
            });
        }
        if self.cycle_timeout.is_some_and(|t| t.is_zero()) {
            errors.push(ConfigError::ZeroCycleTimeout);
        }
        if self.concurrency == 0 {
            errors.push(ConfigError::InvalidConcurrency);
        }
        if self.hosts.is_empty() {
            errors.push(ConfigError::NoHosts);
        }
        for (i, host) in self.hosts.iter().enumerate() {
            if host.trim().is_empty() {
                errors.push(ConfigError::BlankHost(i));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
