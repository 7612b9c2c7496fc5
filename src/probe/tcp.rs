//! TCP connect probe.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use crate::probe::resolve::resolve;
use crate::probe::{Probe, ProbeError, ProbeKind, ProbeResult, Target};

/// Measures the time to complete a TCP handshake.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    default_port: u16,
}

impl TcpProbe {
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(80)
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Tcp
    }

    async fn run(&self, target: &Target, limit: Duration) -> ProbeResult {
        let deadline = Instant::now() + limit;

        let ip = match resolve(target, limit).await {
            Ok(ip) => ip,
            Err(e) => return ProbeResult::failure(e, None),
        };

        let addr = SocketAddr::new(ip, target.port.unwrap_or(self.default_port));
        let remaining = deadline.saturating_duration_since(Instant::now());
        let start = Instant::now();

        match timeout(remaining, TcpStream::connect(addr)).await {
            // Stream is dropped right away; the handshake is all we need.
            Ok(Ok(_stream)) => ProbeResult::success(start.elapsed(), ip),
            Ok(Err(e)) => ProbeResult::failure(classify_connect_error(&e), Some(ip)),
            Err(_) => ProbeResult::failure(ProbeError::Timeout(limit), Some(ip)),
        }
    }
}

fn classify_connect_error(e: &std::io::Error) -> ProbeError {
    match e.kind() {
        ErrorKind::PermissionDenied => ProbeError::Setup(e.to_string()),
        ErrorKind::ConnectionRefused => ProbeError::Unreachable("connection refused".into()),
        ErrorKind::TimedOut => ProbeError::Unreachable("connection timed out".into()),
        _ => ProbeError::Unreachable(e.to_string()),
    }
}
