//! Shared utilities for integration tests.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reachability_monitor::probe::{
    Probe, ProbeError, ProbeKind, ProbeResult, Target, TargetDefaults,
};

/// Address reported for targets that are not IP literals.
pub const FALLBACK_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7));

/// Parse a target with default settings.
pub fn target(raw: &str) -> Target {
    Target::parse(raw, &TargetDefaults::default()).unwrap()
}

/// Tracks how many probes are running at once.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[allow(dead_code)]
impl InFlight {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Probe whose outcome on the n-th call (0-based) is decided by a script.
pub struct ScriptedProbe {
    script: Box<dyn Fn(u64) -> bool + Send + Sync>,
    calls: AtomicU64,
    delay: Duration,
    in_flight: Option<Arc<InFlight>>,
}

#[allow(dead_code)]
impl ScriptedProbe {
    pub fn new(script: impl Fn(u64) -> bool + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicU64::new(0),
            delay: Duration::ZERO,
            in_flight: None,
        }
    }

    pub fn always_up() -> Self {
        Self::new(|_| true)
    }

    pub fn always_down() -> Self {
        Self::new(|_| false)
    }

    /// Up for `half` calls, then down for `half` calls, repeating.
    pub fn alternating(half: u64) -> Self {
        Self::new(move |n| (n / half) % 2 == 0)
    }

    /// Take `delay` to answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_in_flight(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = Some(in_flight);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Tcp
    }

    async fn run(&self, target: &Target, timeout: Duration) -> ProbeResult {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(in_flight) = &self.in_flight {
            in_flight.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(in_flight) = &self.in_flight {
            in_flight.leave();
        }

        let ip = target.literal_ip().unwrap_or(FALLBACK_IP);
        if (self.script)(n) {
            ProbeResult::success(Duration::from_millis(5), ip)
        } else {
            ProbeResult::failure(ProbeError::Timeout(timeout), Some(ip))
        }
    }
}
