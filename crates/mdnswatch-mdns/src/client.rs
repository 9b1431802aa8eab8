//! mDNS client: one-shot presence queries over UDP multicast.
//!
//! Each query uses its own ephemeral sockets, one per enabled address
//! family. Responders answer one-shot queries (source port != 5353) by
//! unicast to the sending socket, so concurrent queries never see each
//! other's traffic and no socket needs to share port 5353 with a local
//! responder.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

use mdnswatch_health::{Discovery, DiscoveryError, Scope};

use crate::message::{answers, encode_query, parse_host};

/// Standard IPv4 mDNS group.
pub const DEFAULT_IPV4_GROUP: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(224, 0, 0, 251), 5353));

/// Standard IPv6 link-local mDNS group.
pub const DEFAULT_IPV6_GROUP: SocketAddr = SocketAddr::V6(SocketAddrV6::new(
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb),
    5353,
    0,
    0,
));

/// Largest mDNS packet we accept (RFC 6762 §17).
const MAX_PACKET: usize = 9000;

/// Errors building an [`MdnsClient`].
#[derive(Debug, Error)]
pub enum MdnsError {
    #[error("at least one of IPv4 or IPv6 must be enabled")]
    NoAddressFamily,

    #[error("IPv4 group address {0} is not an IPv4 address")]
    NotIpv4(SocketAddr),

    #[error("IPv6 group address {0} is not an IPv6 address")]
    NotIpv6(SocketAddr),

    #[error("resend interval must be greater than zero")]
    ZeroResendInterval,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct MdnsConfig {
    pub use_ipv4: bool,
    pub use_ipv6: bool,
    /// Destination for IPv4 queries.
    pub ipv4_group: SocketAddr,
    /// Destination for IPv6 queries.
    pub ipv6_group: SocketAddr,
    /// How often an unanswered query is sent again.
    pub resend_interval: Duration,
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            use_ipv4: true,
            use_ipv6: true,
            ipv4_group: DEFAULT_IPV4_GROUP,
            ipv6_group: DEFAULT_IPV6_GROUP,
            resend_interval: Duration::from_secs(1),
        }
    }
}

/// Multicast DNS presence resolver.
#[derive(Debug, Clone)]
pub struct MdnsClient {
    config: MdnsConfig,
}

/// Sockets of one in-flight query.
struct QuerySockets {
    v4: Option<(UdpSocket, SocketAddr)>,
    v6: Option<(UdpSocket, SocketAddr)>,
}

impl MdnsClient {
    pub fn new(config: MdnsConfig) -> Result<Self, MdnsError> {
        if !config.use_ipv4 && !config.use_ipv6 {
            return Err(MdnsError::NoAddressFamily);
        }
        if config.use_ipv4 && !config.ipv4_group.is_ipv4() {
            return Err(MdnsError::NotIpv4(config.ipv4_group));
        }
        if config.use_ipv6 && !config.ipv6_group.is_ipv6() {
            return Err(MdnsError::NotIpv6(config.ipv6_group));
        }
        if config.resend_interval.is_zero() {
            return Err(MdnsError::ZeroResendInterval);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &MdnsConfig {
        &self.config
    }

    async fn open_sockets(&self) -> Result<QuerySockets, DiscoveryError> {
        let mut sockets = QuerySockets { v4: None, v6: None };
        let mut last_err = None;

        if self.config.use_ipv4 {
            match bind_v4().await {
                Ok(socket) => sockets.v4 = Some((socket, self.config.ipv4_group)),
                Err(e) => {
                    debug!(error = %e, "failed to bind IPv4 query socket");
                    last_err = Some(e);
                }
            }
        }
        if self.config.use_ipv6 {
            match bind_v6().await {
                Ok(socket) => sockets.v6 = Some((socket, self.config.ipv6_group)),
                Err(e) => {
                    debug!(error = %e, "failed to bind IPv6 query socket");
                    last_err = Some(e);
                }
            }
        }

        match (&sockets.v4, &sockets.v6, last_err) {
            (None, None, Some(e)) => Err(DiscoveryError::Transport(e)),
            _ => Ok(sockets),
        }
    }
}

impl QuerySockets {
    /// Send `packet` on every socket. Fails only if no family could send.
    async fn send(&self, packet: &[u8]) -> Result<(), DiscoveryError> {
        let mut sent = false;
        let mut last_err = None;

        for (socket, group) in self.v4.iter().chain(self.v6.iter()) {
            match socket.send_to(packet, group).await {
                Ok(_) => sent = true,
                Err(e) => {
                    debug!(%group, error = %e, "failed to send mdns query");
                    last_err = Some(e);
                }
            }
        }

        match (sent, last_err) {
            (false, Some(e)) => Err(DiscoveryError::Transport(e)),
            _ => Ok(()),
        }
    }
}

impl Discovery for MdnsClient {
    async fn resolve_presence(&self, scope: &Scope, host: &str) -> Result<(), DiscoveryError> {
        let name = parse_host(host)?;
        let packet = encode_query(&name)?;
        let sockets = self.open_sockets().await?;

        let mut resend = tokio::time::interval(self.config.resend_interval);
        let mut buf_v4 = vec![0u8; MAX_PACKET];
        let mut buf_v6 = vec![0u8; MAX_PACKET];
        let mut rx_v4 = sockets.v4.as_ref().map(|(socket, _)| socket);
        let mut rx_v6 = sockets.v6.as_ref().map(|(socket, _)| socket);

        loop {
            tokio::select! {
                biased;
                end = scope.done() => return Err(DiscoveryError::Interrupted(end)),
                received = recv(rx_v4, &mut buf_v4) => match received {
                    Ok((len, from)) => {
                        if answers(&buf_v4[..len], &name) {
                            debug!(%host, %from, "mdns answer received");
                            return Ok(());
                        }
                    }
                    Err(e) => drop_receiver(&mut rx_v4, rx_v6.is_some(), "IPv4", e)?,
                },
                received = recv(rx_v6, &mut buf_v6) => match received {
                    Ok((len, from)) => {
                        if answers(&buf_v6[..len], &name) {
                            debug!(%host, %from, "mdns answer received");
                            return Ok(());
                        }
                    }
                    Err(e) => drop_receiver(&mut rx_v6, rx_v4.is_some(), "IPv6", e)?,
                },
                _ = resend.tick() => {
                    sockets.send(&packet).await?;
                }
            }
        }
    }
}

async fn bind_v4() -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
    socket.set_multicast_ttl_v4(255)?;
    Ok(socket)
}

async fn bind_v6() -> io::Result<UdpSocket> {
    UdpSocket::bind(SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))).await
}

/// Receive on `socket`, or never resolve when it is absent.
async fn recv(socket: Option<&UdpSocket>, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
    match socket {
        Some(socket) => socket.recv_from(buf).await,
        None => std::future::pending().await,
    }
}

/// Stop receiving on a failed socket. The query fails only once no
/// socket is left to receive on.
fn drop_receiver<T>(
    slot: &mut Option<T>,
    other_open: bool,
    family: &str,
    err: io::Error,
) -> Result<(), DiscoveryError> {
    debug!(%family, error = %err, "mdns receive failed, dropping socket");
    *slot = None;
    if other_open {
        Ok(())
    } else {
        Err(DiscoveryError::Transport(err))
    }
}
