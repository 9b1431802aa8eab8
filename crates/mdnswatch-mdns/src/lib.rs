//! mdnswatch-mdns: multicast DNS discovery backend.
//!
//! Implements [`mdnswatch_health::Discovery`] by sending one-shot mDNS
//! queries for a host's A/AAAA records and waiting for any responder to
//! claim the name. The query is re-sent every `resend_interval` until an
//! answer arrives or the caller's scope ends.

pub mod client;
pub mod message;

pub use client::{DEFAULT_IPV4_GROUP, DEFAULT_IPV6_GROUP, MdnsClient, MdnsConfig, MdnsError};
