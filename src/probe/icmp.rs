//! ICMP echo probe.
//!
//! # Design Decisions
//! - One `surge_ping::Client` (one socket) per address family, shared by every
//!   ICMP probe and created on first use inside the runtime
//! - Each probe owns a random identifier so replies are matched per target
//! - Socket creation failures (usually missing CAP_NET_RAW) are setup failures

use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError, ICMP};
use tokio::time::Instant;

use crate::probe::resolve::resolve;
use crate::probe::{Probe, ProbeError, ProbeKind, ProbeResult, Target};

/// Lazily created ICMP sockets shared between probes.
#[derive(Default)]
pub struct IcmpClients {
    v4: OnceLock<Result<Client, String>>,
    v6: OnceLock<Result<Client, String>>,
}

impl IcmpClients {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, ip: &IpAddr) -> Result<Client, ProbeError> {
        let (cell, kind, family) = match ip {
            IpAddr::V4(_) => (&self.v4, ICMP::V4, "v4"),
            IpAddr::V6(_) => (&self.v6, ICMP::V6, "v6"),
        };

        let created = cell.get_or_init(|| {
            let config = Config::builder().kind(kind).build();
            Client::new(&config).map_err(|e| {
                tracing::warn!(error = %e, family, "ICMP socket unavailable");
                describe_socket_error(&e)
            })
        });

        created.clone().map_err(ProbeError::Setup)
    }
}

fn describe_socket_error(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::PermissionDenied => {
            format!("cannot open ICMP socket ({e}); run with CAP_NET_RAW or use the tcp/system probe")
        }
        _ => format!("cannot open ICMP socket: {e}"),
    }
}

/// Sends one echo request per cycle and waits for the matching reply.
pub struct IcmpProbe {
    clients: Arc<IcmpClients>,
    identifier: PingIdentifier,
    sequence: AtomicU16,
    payload: Vec<u8>,
}

impl IcmpProbe {
    pub fn new(clients: Arc<IcmpClients>, payload_size: usize) -> Self {
        Self {
            clients,
            identifier: PingIdentifier(rand::random()),
            sequence: AtomicU16::new(0),
            payload: vec![0u8; payload_size],
        }
    }
}

#[async_trait]
impl Probe for IcmpProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Icmp
    }

    async fn run(&self, target: &Target, limit: Duration) -> ProbeResult {
        let deadline = Instant::now() + limit;

        let ip = match resolve(target, limit).await {
            Ok(ip) => ip,
            Err(e) => return ProbeResult::failure(e, None),
        };

        let client = match self.clients.client_for(&ip) {
            Ok(client) => client,
            Err(e) => return ProbeResult::failure(e, Some(ip)),
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ProbeResult::failure(ProbeError::Timeout(limit), Some(ip));
        }

        let mut pinger = client.pinger(ip, self.identifier).await;
        pinger.timeout(remaining);

        let seq = PingSequence(self.sequence.fetch_add(1, Ordering::Relaxed));
        match pinger.ping(seq, &self.payload).await {
            Ok((_packet, rtt)) => ProbeResult::success(rtt, ip),
            Err(SurgeError::Timeout { .. }) => ProbeResult::failure(ProbeError::Timeout(limit), Some(ip)),
            Err(SurgeError::IOError(e)) if e.kind() == io::ErrorKind::PermissionDenied => {
                ProbeResult::failure(ProbeError::Setup(e.to_string()), Some(ip))
            }
            Err(e) => ProbeResult::failure(ProbeError::Unreachable(e.to_string()), Some(ip)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_message_names_alternatives() {
        let e = io::Error::new(io::ErrorKind::PermissionDenied, "Operation not permitted");
        let msg = describe_socket_error(&e);
        assert!(msg.contains("CAP_NET_RAW"));
        assert!(msg.contains("tcp/system"));
    }

    #[test]
    fn test_probes_get_distinct_identifiers() {
        let clients = Arc::new(IcmpClients::new());
        let ids: std::collections::HashSet<u16> = (0..8)
            .map(|_| IcmpProbe::new(clients.clone(), 56).identifier.0)
            .collect();
        assert!(ids.len() > 1);
    }
}
