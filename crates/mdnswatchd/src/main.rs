//! mdnswatchd: the mdnswatch daemon.
//!
//! Probes a fixed list of hosts over multicast DNS on a fixed interval and
//! exposes the latest result as Prometheus gauges.
//!
//! # Usage
//!
//! ```text
//! mdnswatchd --probe.hosts printer.local,nas.local --probe.interval 30s
//! ```

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use mdnswatch_health::{Check, CheckTask, CycleEvent, ProbeGate, Prober, Scheduler, Scope};
use mdnswatch_mdns::MdnsClient;
use mdnswatch_metrics::{MetricsPublisher, MetricsRegistry};

use crate::config::{Cli, Settings};

/// Shared bound on stopping the scheduler and the metrics server.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Cli::parse().into_settings()?;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_str())),
        )
        .init();

    let span = info_span!(
        "mdnswatchd",
        pid = std::process::id(),
        machine = %machine_name(),
        version = env!("CARGO_PKG_VERSION"),
    );

    let result = run(settings).instrument(span.clone()).await;
    if let Err(err) = &result {
        span.in_scope(|| error!(error = %format!("{err:#}"), "mdnswatchd failed"));
    }
    result
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    info!(
        hosts = settings.probe.hosts.len(),
        interval = ?settings.probe.interval,
        timeout = ?settings.probe.timeout,
        cycle_timeout = ?settings.probe.cycle_timeout,
        concurrency = settings.probe.concurrency,
        ipv4 = settings.mdns.use_ipv4,
        ipv6 = settings.mdns.use_ipv6,
        "mdnswatchd starting"
    );

    // ── Probing engine ─────────────────────────────────────────

    let registry = MetricsRegistry::new();
    let publisher = Arc::new(MetricsPublisher::new(registry.clone()));
    let discovery = Arc::new(MdnsClient::new(settings.mdns.clone())?);
    let gate = ProbeGate::new(settings.probe.concurrency)?;
    let prober = Arc::new(Prober::new(discovery, gate));
    let check = Check::new(prober, publisher, settings.probe.timeout)?;
    let task = Arc::new(CheckTask::new(check, settings.probe.hosts.clone()));

    let mut scheduler = Scheduler::new(task, settings.probe.interval)?;
    if let Some(timeout) = settings.probe.cycle_timeout {
        scheduler = scheduler.with_cycle_timeout(timeout)?;
    }
    let scheduler = Arc::new(scheduler);

    let events = tokio::spawn(log_cycles(scheduler.subscribe()).in_current_span());

    // ── Metrics server ─────────────────────────────────────────

    let listener = tokio::net::TcpListener::bind(settings.metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics server to {}", settings.metrics_addr))?;
    info!(addr = %settings.metrics_addr, path = %settings.metrics_path, "metrics server listening");

    let router = mdnswatch_api::build_router(registry, &settings.metrics_path);
    let stop = Scope::new();
    let mut server = {
        let stop = stop.clone();
        tokio::spawn(
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        stop.done().await;
                    })
                    .await
            }
            .in_current_span(),
        )
    };

    // ── Scheduler ──────────────────────────────────────────────

    let mut runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.start().await }.in_current_span())
    };

    let outcome = tokio::select! {
        signal = shutdown_signal() => {
            let signal = signal.context("failed to install signal handlers")?;
            info!(signal, "shutdown signal received");
            Ok(())
        }
        res = &mut server => Err(exited("metrics server", res)),
        res = &mut runner => Err(exited("scheduler", res)),
    };

    if outcome.is_ok() {
        let bound = Scope::new().with_timeout(SHUTDOWN_TIMEOUT);
        stop.cancel();
        let (scheduler_stopped, server_stopped) =
            tokio::join!(scheduler.shutdown(&bound), await_within(&bound, &mut server));

        if let Err(err) = scheduler_stopped {
            warn!(error = %err, "scheduler did not stop cleanly");
            runner.abort();
        }
        match server_stopped {
            Some(Ok(Ok(()))) => debug!("metrics server stopped"),
            Some(Ok(Err(err))) => warn!(error = %err, "metrics server stopped with error"),
            Some(Err(err)) => warn!(error = %err, "metrics server task failed"),
            None => {
                warn!(timeout = ?SHUTDOWN_TIMEOUT, "metrics server did not stop in time");
                server.abort();
            }
        }
    } else {
        stop.cancel();
        server.abort();
        runner.abort();
    }

    events.abort();
    info!("mdnswatchd stopped");
    outcome
}

/// Log the outcome of every scheduled check.
async fn log_cycles(mut events: broadcast::Receiver<CycleEvent>) {
    loop {
        match events.recv().await {
            Ok(CycleEvent::Started { trace_id }) => {
                debug!(%trace_id, "check started");
            }
            Ok(CycleEvent::Completed { trace_id, elapsed }) => {
                info!(%trace_id, elapsed_ms = elapsed.as_millis() as u64, "check completed");
            }
            Ok(CycleEvent::Failed {
                trace_id,
                elapsed,
                error,
            }) => {
                error!(
                    %trace_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "check failed"
                );
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "cycle events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Wait for `handle` unless `scope` ends first.
async fn await_within<T>(scope: &Scope, handle: &mut JoinHandle<T>) -> Option<Result<T, JoinError>> {
    tokio::select! {
        res = handle => Some(res),
        _ = scope.done() => None,
    }
}

fn exited<E>(what: &str, res: Result<Result<(), E>, JoinError>) -> anyhow::Error
where
    E: Into<anyhow::Error>,
{
    match res {
        Ok(Ok(())) => anyhow::anyhow!("{what} exited unexpectedly"),
        Ok(Err(err)) => {
            let err: anyhow::Error = err.into();
            err.context(format!("{what} failed"))
        }
        Err(err) => anyhow::Error::new(err).context(format!("{what} task failed")),
    }
}

async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "SIGINT")
    }
}

/// Host name of this machine, for the program span.
fn machine_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/proc/sys/kernel/hostname").ok())
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
