//! Prometheus text exposition format.
//!
//! Renders a [`NetworkSnapshot`] for scraping by a Prometheus server or
//! compatible agent.

use std::fmt::Write;

use crate::registry::NetworkSnapshot;

/// Content type of [`render_prometheus`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const PREFIX: &str = "mdns_";

/// Render the snapshot into Prometheus text format.
///
/// Every gauge is always declared; per-host series appear once a host has
/// been observed.
pub fn render_prometheus(snapshot: &NetworkSnapshot) -> String {
    let mut out = String::new();

    gauge(
        &mut out,
        "network_status",
        "Status of the network (1: success, 0: failure)",
        snapshot.status,
    );
    gauge(
        &mut out,
        "network_hosts_total",
        "Total number of hosts on the network",
        snapshot.hosts_total,
    );
    gauge(
        &mut out,
        "network_hosts_up",
        "Number of hosts up on the network",
        snapshot.hosts_up,
    );
    gauge(
        &mut out,
        "network_hosts_down",
        "Number of hosts down on the network",
        snapshot.hosts_down,
    );

    header(
        &mut out,
        "network_host_status",
        "Status of a specific host (1: up, 0: down)",
    );
    for (host, up) in &snapshot.hosts {
        let _ = writeln!(
            out,
            "{PREFIX}network_host_status{{host=\"{}\"}} {}",
            escape_label(host),
            u8::from(*up)
        );
    }

    out
}

fn header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {PREFIX}{name} {help}");
    let _ = writeln!(out, "# TYPE {PREFIX}{name} gauge");
}

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    header(out, name, help);
    let _ = writeln!(out, "{PREFIX}{name} {value}");
}

/// Escape a label value per the exposition format.
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
