//! Error types for the probing engine.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::scope::ScopeEnd;

/// Invalid construction parameters. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("probe concurrency must be greater than zero")]
    InvalidConcurrency,

    #[error("probe interval must be greater than zero")]
    ZeroInterval,

    #[error("probe timeout must be greater than zero")]
    ZeroTimeout,

    #[error("probe interval ({interval:?}) must be greater than probe timeout ({timeout:?})")]
    IntervalNotAboveTimeout { interval: Duration, timeout: Duration },

    #[error("cycle timeout must be greater than zero")]
    ZeroCycleTimeout,

    #[error("at least one host must be configured")]
    NoHosts,

    #[error("host name at position {0} is blank")]
    BlankHost(usize),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failure reported by a discovery backend.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The query's scope ended before an answer arrived.
    #[error("query interrupted: {0}")]
    Interrupted(ScopeEnd),

    #[error("invalid host name {host}: {reason}")]
    InvalidName { host: String, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Failure of a single probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The caller's scope ended: the whole cycle ran out of time or is
    /// being shut down.
    #[error("probe interrupted: {0}")]
    Interrupted(ScopeEnd),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Failure delivering a check result.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PublishError {
    message: String,
}

impl PublishError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure of a whole check cycle.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to probe host {host}: {source}")]
    Probe {
        host: String,
        #[source]
        source: ProbeError,
    },

    #[error("unknown state for host {host}")]
    UnknownState { host: String },

    #[error("failed to publish check results: {0}")]
    Publish(#[source] PublishError),

    #[error("probe task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CheckError {
    /// Whether this error only reflects a deliberate cancellation.
    ///
    /// An elapsed cycle deadline is not a cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            CheckError::Probe {
                source: ProbeError::Interrupted(ScopeEnd::Cancelled),
                ..
            }
        )
    }
}

/// Scheduler lifecycle errors.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("scheduler has been shut down")]
    Stopped,

    #[error("timed out waiting for the scheduler to stop")]
    ShutdownTimeout,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Shared, cloneable handle to a cycle failure.
pub type SharedCheckError = Arc<CheckError>;
