//! Check orchestrator: fans a host list out across a [`Probe`] and
//! publishes the partition of up and down hosts.
//!
//! All probes of one cycle share a cancellation scope. The first failure
//! cancels it, the remaining probes are aborted, and nothing is
//! published.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{CheckError, ConfigError, ConfigResult};
use crate::ports::{HostState, Probe, ProbeOutcome, Publisher};
use crate::scope::Scope;

/// Partition of one cycle's hosts by reachability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl CheckResult {
    fn with_capacity(n: usize) -> Self {
        Self {
            up: Vec::with_capacity(n),
            down: Vec::with_capacity(n),
        }
    }

    /// Fold one probe outcome in, or report why the cycle must fail.
    fn record(&mut self, outcome: ProbeOutcome) -> Result<(), CheckError> {
        if let Some(source) = outcome.error {
            return Err(CheckError::Probe {
                host: outcome.host,
                source,
            });
        }
        match outcome.state {
            HostState::Up => self.up.push(outcome.host),
            HostState::Down => self.down.push(outcome.host),
            HostState::Unknown => return Err(CheckError::UnknownState { host: outcome.host }),
        }
        Ok(())
    }

    pub fn total(&self) -> usize {
        self.up.len() + self.down.len()
    }
}

/// Runs one check cycle over a host list.
pub struct Check<P, B> {
    probe: Arc<P>,
    publisher: Arc<B>,
    timeout: Duration,
}

impl<P: Probe, B: Publisher> Check<P, B> {
    /// Create an orchestrator probing each host with `timeout`.
    pub fn new(probe: Arc<P>, publisher: Arc<B>, timeout: Duration) -> ConfigResult<Self> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(Self {
            probe,
            publisher,
            timeout,
        })
    }

    /// Probe every host once and publish the result.
    ///
    /// Returns the first error encountered; on error nothing is published.
    pub async fn execute(&self, scope: &Scope, hosts: &[String]) -> Result<CheckResult, CheckError> {
        let cycle = scope.child();
        let aggregate = Arc::new(Mutex::new(CheckResult::with_capacity(hosts.len())));
        let mut tasks = JoinSet::new();

        for host in hosts {
            let probe = Arc::clone(&self.probe);
            let aggregate = Arc::clone(&aggregate);
            let cycle = cycle.clone();
            let host = host.clone();
            let timeout = self.timeout;

            tasks.spawn(async move {
                let result = probe.probe(&cycle, &host, timeout).await;
                let outcome = ProbeOutcome::from_result(host, result);
                aggregate.lock().await.record(outcome)
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => CheckError::Task(e),
            };
            if first_error.is_none() {
                debug!(error = %failure, "aborting remaining probes");
                cycle.cancel();
                tasks.abort_all();
                first_error = Some(failure);
            }
        }
        cycle.cancel();

        if let Some(err) = first_error {
            return Err(err);
        }

        let result = std::mem::take(&mut *aggregate.lock().await);
        debug!(up = result.up.len(), down = result.down.len(), "all hosts probed");

        self.publisher
            .publish(scope, &result.up, &result.down)
            .await
            .map_err(CheckError::Publish)?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiscoveryError, ProbeError, PublishError};
    use crate::scope::ScopeEnd;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Scripted {
        Up,
        Down,
        Unknown,
        Fault,
        Hang,
    }

    struct ScriptedProbe {
        script: StdMutex<HashMap<String, Scripted>>,
        calls: AtomicUsize,
        interrupted: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(script: &[(&str, Scripted)]) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.iter().map(|(h, s)| (h.to_string(), *s)).collect()),
                calls: AtomicUsize::new(0),
                interrupted: AtomicUsize::new(0),
            })
        }

        fn set(&self, host: &str, s: Scripted) {
            self.script.lock().unwrap().insert(host.to_string(), s);
        }
    }

    impl Probe for ScriptedProbe {
        async fn probe(
            &self,
            scope: &Scope,
            host: &str,
            timeout: Duration,
        ) -> Result<HostState, ProbeError> {
            assert_eq!(timeout, Duration::from_secs(10));
            self.calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.script.lock().unwrap().get(host).copied();
            match scripted.unwrap_or(Scripted::Unknown) {
                Scripted::Up => Ok(HostState::Up),
                Scripted::Down => Ok(HostState::Down),
                Scripted::Unknown => Ok(HostState::Unknown),
                Scripted::Fault => Err(ProbeError::Discovery(DiscoveryError::Protocol(
                    "probe failed".into(),
                ))),
                Scripted::Hang => {
                    let end = scope.done().await;
                    self.interrupted.fetch_add(1, Ordering::SeqCst);
                    Err(ProbeError::Interrupted(end))
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        calls: StdMutex<Vec<(Vec<String>, Vec<String>)>>,
        fail: bool,
    }

    impl RecordingPublisher {
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Self::default()
            })
        }

        fn calls(&self) -> Vec<(Vec<String>, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Publisher for RecordingPublisher {
        async fn publish(&self, _scope: &Scope, up: &[String], down: &[String]) -> Result<(), PublishError> {
            let mut up = up.to_vec();
            let mut down = down.to_vec();
            up.sort();
            down.sort();
            self.calls.lock().unwrap().push((up, down));
            if self.fail {
                return Err(PublishError::new("publish failed"));
            }
            Ok(())
        }
    }

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|h| h.to_string()).collect()
    }

    fn check(
        probe: &Arc<ScriptedProbe>,
        publisher: &Arc<RecordingPublisher>,
    ) -> Check<ScriptedProbe, RecordingPublisher> {
        Check::new(Arc::clone(probe), Arc::clone(publisher), Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn zero_timeout_rejected() {
        let probe = ScriptedProbe::new(&[]);
        let publisher = Arc::new(RecordingPublisher::default());
        assert!(matches!(
            Check::new(probe, publisher, Duration::ZERO),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[tokio::test]
    async fn partitions_up_and_down_hosts() {
        let probe = ScriptedProbe::new(&[
            ("printer1.local", Scripted::Up),
            ("printer2.local", Scripted::Down),
        ]);
        let publisher = Arc::new(RecordingPublisher::default());

        let result = check(&probe, &publisher)
            .execute(&Scope::new(), &hosts(&["printer1.local", "printer2.local"]))
            .await
            .unwrap();

        assert_eq!(result.up, hosts(&["printer1.local"]));
        assert_eq!(result.down, hosts(&["printer2.local"]));
        assert_eq!(
            publisher.calls(),
            vec![(hosts(&["printer1.local"]), hosts(&["printer2.local"]))]
        );
    }

    #[tokio::test]
    async fn all_up_then_all_down() {
        let probe = ScriptedProbe::new(&[("a.local", Scripted::Up), ("b.local", Scripted::Up)]);
        let publisher = Arc::new(RecordingPublisher::default());
        let check = check(&probe, &publisher);
        let list = hosts(&["a.local", "b.local"]);

        check.execute(&Scope::new(), &list).await.unwrap();
        probe.set("a.local", Scripted::Down);
        probe.set("b.local", Scripted::Down);
        check.execute(&Scope::new(), &list).await.unwrap();

        assert_eq!(
            publisher.calls(),
            vec![
                (hosts(&["a.local", "b.local"]), vec![]),
                (vec![], hosts(&["a.local", "b.local"])),
            ]
        );
    }

    #[tokio::test]
    async fn duplicates_are_probed_independently() {
        let probe = ScriptedProbe::new(&[("a.local", Scripted::Up), ("b.local", Scripted::Down)]);
        let publisher = Arc::new(RecordingPublisher::default());

        let result = check(&probe, &publisher)
            .execute(&Scope::new(), &hosts(&["a.local", "b.local", "a.local"]))
            .await
            .unwrap();

        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.total(), 3);
        assert_eq!(publisher.calls()[0].0, hosts(&["a.local", "a.local"]));
    }

    #[tokio::test]
    async fn fault_aborts_cycle_without_publishing() {
        let probe = ScriptedProbe::new(&[
            ("a.local", Scripted::Up),
            ("b.local", Scripted::Down),
            ("c.local", Scripted::Fault),
        ]);
        let publisher = Arc::new(RecordingPublisher::default());

        let err = check(&probe, &publisher)
            .execute(&Scope::new(), &hosts(&["a.local", "b.local", "c.local"]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("c.local"), "{err}");
        assert!(err.to_string().contains("failed to probe host"));
        assert!(publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_state_aborts_cycle() {
        let probe = ScriptedProbe::new(&[("printer1.local", Scripted::Unknown)]);
        let publisher = Arc::new(RecordingPublisher::default());

        let err = check(&probe, &publisher)
            .execute(&Scope::new(), &hosts(&["printer1.local"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckError::UnknownState { ref host } if host == "printer1.local"));
        assert!(publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn failure_cancels_in_flight_probes() {
        let probe = ScriptedProbe::new(&[
            ("slow1.local", Scripted::Hang),
            ("slow2.local", Scripted::Hang),
            ("bad.local", Scripted::Fault),
        ]);
        let publisher = Arc::new(RecordingPublisher::default());

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            check(&probe, &publisher).execute(
                &Scope::new(),
                &hosts(&["slow1.local", "slow2.local", "bad.local"]),
            ),
        )
        .await
        .expect("cycle must not wait for hanging probes")
        .unwrap_err();

        assert!(err.to_string().contains("bad.local"));
        assert!(publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_cycle_error() {
        let probe = ScriptedProbe::new(&[
            ("printer1.local", Scripted::Up),
            ("printer2.local", Scripted::Down),
        ]);
        let publisher = RecordingPublisher::failing();

        let err = check(&probe, &publisher)
            .execute(&Scope::new(), &hosts(&["printer1.local", "printer2.local"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckError::Publish(_)));
        assert!(err.to_string().contains("failed to publish check results"));
        assert_eq!(publisher.calls().len(), 1);
    }

    #[tokio::test]
    async fn caller_cancellation_surfaces_as_cancellation() {
        let probe = ScriptedProbe::new(&[("slow.local", Scripted::Hang)]);
        let publisher = Arc::new(RecordingPublisher::default());
        let scope = Scope::new();

        let run = {
            let check = check(&probe, &publisher);
            let scope = scope.clone();
            tokio::spawn(async move { check.execute(&scope, &hosts(&["slow.local"])).await })
        };
        tokio::task::yield_now().await;
        scope.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(err.is_cancellation());
        assert!(matches!(
            err,
            CheckError::Probe {
                source: ProbeError::Interrupted(ScopeEnd::Cancelled),
                ..
            }
        ));
        assert!(publisher.calls().is_empty());
    }
}
