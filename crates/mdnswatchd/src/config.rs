//! Command line and environment configuration.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use clap::{ArgAction, Parser};
use thiserror::Error;
use tracing::Level;

use mdnswatch_health::{ConfigError, ProbeConfig};
use mdnswatch_mdns::MdnsConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "mdnswatchd", version, about = "mDNS host reachability daemon")]
pub struct Cli {
    /// Time between check starts.
    #[arg(long = "probe.interval", env = "PROBE_INTERVAL", default_value = "30s", value_parser = parse_duration)]
    pub interval: Duration,

    /// Time a single host has to answer.
    #[arg(long = "probe.timeout", env = "PROBE_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Upper bound on a whole check. Unbounded when unset.
    #[arg(long = "probe.cycle-timeout", env = "PROBE_CYCLE_TIMEOUT", value_parser = parse_duration)]
    pub cycle_timeout: Option<Duration>,

    /// Maximum number of hosts probed at once.
    #[arg(long = "probe.concurrency", env = "PROBE_CONCURRENCY", default_value_t = 10)]
    pub concurrency: usize,

    /// Query over IPv4.
    #[arg(long = "probe.ipv4", env = "PROBE_USE_IPV4", default_value_t = true, action = ArgAction::Set)]
    pub use_ipv4: bool,

    /// IPv4 multicast group queries are sent to.
    #[arg(long = "probe.ipv4.addr", env = "PROBE_IPV4_ADDR", default_value = "224.0.0.251:5353")]
    pub ipv4_addr: SocketAddr,

    /// Query over IPv6.
    #[arg(long = "probe.ipv6", env = "PROBE_USE_IPV6", default_value_t = true, action = ArgAction::Set)]
    pub use_ipv6: bool,

    /// IPv6 multicast group queries are sent to.
    #[arg(long = "probe.ipv6.addr", env = "PROBE_IPV6_ADDR", default_value = "[ff02::fb]:5353")]
    pub ipv6_addr: SocketAddr,

    /// Hosts to probe, comma separated.
    #[arg(long = "probe.hosts", env = "PROBE_HOSTS", value_delimiter = ',', required = true)]
    pub hosts: Vec<String>,

    /// Listen address of the metrics server.
    #[arg(long = "metrics.addr", env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    pub metrics_addr: SocketAddr,

    /// Path the metrics are served on.
    #[arg(long = "metrics.path", env = "METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,

    /// One of debug, info, warn, error.
    #[arg(long = "log.level", env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error(transparent)]
    Probe(#[from] ConfigError),

    #[error("at least one of IPv4 or IPv6 must be enabled")]
    NoAddressFamily,

    #[error("IPv4 address {0} is not an IPv4 address")]
    NotIpv4(SocketAddr),

    #[error("IPv6 address {0} is not an IPv6 address")]
    NotIpv6(SocketAddr),

    #[error("metrics path {0:?} must begin with '/'")]
    MetricsPath(String),

    #[error("log level {0:?} is not one of debug, info, warn, error")]
    LogLevel(String),
}

/// Every problem found while validating a [`Cli`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct InvalidConfig(pub Vec<SettingError>);

impl fmt::Display for InvalidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration: ")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// Validated daemon settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub probe: ProbeConfig,
    pub mdns: MdnsConfig,
    pub metrics_addr: SocketAddr,
    pub metrics_path: String,
    pub log_level: Level,
}

impl Cli {
    /// Validate every flag, reporting all problems at once.
    pub fn into_settings(self) -> Result<Settings, InvalidConfig> {
        let probe = ProbeConfig {
            interval: self.interval,
            timeout: self.timeout,
            cycle_timeout: self.cycle_timeout,
            concurrency: self.concurrency,
            hosts: self.hosts.iter().map(|h| h.trim().to_string()).collect(),
        };

        let mut errors: Vec<SettingError> = match probe.validate() {
            Ok(()) => Vec::new(),
            Err(errs) => errs.into_iter().map(SettingError::from).collect(),
        };

        if !self.use_ipv4 && !self.use_ipv6 {
            errors.push(SettingError::NoAddressFamily);
        }
        if !self.ipv4_addr.is_ipv4() {
            errors.push(SettingError::NotIpv4(self.ipv4_addr));
        }
        if !self.ipv6_addr.is_ipv6() {
            errors.push(SettingError::NotIpv6(self.ipv6_addr));
        }
        if !self.metrics_path.starts_with('/') {
            errors.push(SettingError::MetricsPath(self.metrics_path.clone()));
        }
        let log_level = parse_level(&self.log_level);
        if log_level.is_none() {
            errors.push(SettingError::LogLevel(self.log_level.clone()));
        }

        match log_level {
            Some(log_level) if errors.is_empty() => Ok(Settings {
                probe,
                mdns: MdnsConfig {
                    use_ipv4: self.use_ipv4,
                    use_ipv6: self.use_ipv6,
                    ipv4_group: self.ipv4_addr,
                    ipv6_group: self.ipv6_addr,
                    ..MdnsConfig::default()
                },
                metrics_addr: self.metrics_addr,
                metrics_path: self.metrics_path,
                log_level,
            }),
            _ => Err(InvalidConfig(errors)),
        }
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Parse a duration string like "500ms", "10s", "5m", "1h" or "30".
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let invalid = || format!("invalid duration {s:?}, expected e.g. 500ms, 10s, 5m, 1h");

    let (value, unit) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else {
        (s, 1_000)
    };

    let value: u64 = value.trim().parse().map_err(|_| invalid())?;
    value
        .checked_mul(unit)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}
