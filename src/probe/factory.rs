//! Probe construction keyed on the target's probe kind.

use std::sync::Arc;

use crate::config::ProbeConfig;
use crate::probe::icmp::{IcmpClients, IcmpProbe};
use crate::probe::system::SystemProbe;
use crate::probe::tcp::TcpProbe;
use crate::probe::{Probe, ProbeKind, Target};

/// Builds probe instances for targets.
///
/// ICMP sockets are shared across every probe built by the same factory.
pub struct ProbeFactory {
    config: ProbeConfig,
    icmp: Arc<IcmpClients>,
}

impl ProbeFactory {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            icmp: Arc::new(IcmpClients::new()),
        }
    }

    /// Create the probe matching `target.kind`.
    pub fn build(&self, target: &Target) -> Arc<dyn Probe> {
        match target.kind {
            ProbeKind::Icmp => Arc::new(IcmpProbe::new(self.icmp.clone(), self.config.payload_size)),
            ProbeKind::Tcp => Arc::new(TcpProbe::new(self.config.default_tcp_port)),
            ProbeKind::System => Arc::new(SystemProbe::new(self.config.ping_command.clone())),
        }
    }
}

impl Default for ProbeFactory {
    fn default() -> Self {
        Self::new(ProbeConfig::default())
    }
}
