//! mdnswatch-health: the probing engine behind mdnswatch.
//!
//! Periodically checks a static list of hosts through a discovery backend
//! and hands the partition of reachable and unreachable hosts to a
//! publisher.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (single-flight, immediate first tick, one pending tick max)
//!   └── CheckTask → Check::execute(scope, hosts)
//!         ├── one tokio task per host, shared cycle scope
//!         │     └── Prober::probe(scope, host, timeout)
//!         │           ├── ProbeGate::acquire   (bounded concurrency)
//!         │           └── Discovery::resolve_presence (bounded sub-scope)
//!         └── Publisher::publish(up, down)   (only when every host classified)
//! ```
//!
//! # Classification
//!
//! A host that does not answer within its probe timeout is `Down`, which is
//! a normal result. A probe cut short because the caller's scope ended is
//! an error, so a cycle that ran out of time is never reported as "all
//! hosts down".

pub mod check;
pub mod config;
pub mod error;
pub mod gate;
pub mod ports;
pub mod prober;
pub mod scheduler;
pub mod scope;

pub use check::{Check, CheckResult};
pub use config::ProbeConfig;
pub use error::{
    CheckError, ConfigError, DiscoveryError, ProbeError, PublishError, SchedulerError,
};
pub use gate::{GatePermit, ProbeGate};
pub use ports::{Discovery, HostState, Probe, ProbeOutcome, Publisher};
pub use prober::Prober;
pub use scheduler::{CheckTask, CycleEvent, RunState, Scheduler, Task};
pub use scope::{Scope, ScopeEnd};
