//! Output filter applied where snapshots are consumed.

use crate::config::OutputConfig;
use crate::monitor::HostStats;

/// Which hosts a report shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFilter {
    #[default]
    All,
    /// Up with no outstanding error.
    OnlineOnly,
    /// Everything that is not online.
    OfflineOnly,
}

impl OutputFilter {
    /// Build from the two exclusive flags. Validation rejects both being set.
    pub fn from_flags(only_online: bool, only_offline: bool) -> Self {
        match (only_online, only_offline) {
            (true, _) => OutputFilter::OnlineOnly,
            (false, true) => OutputFilter::OfflineOnly,
            (false, false) => OutputFilter::All,
        }
    }

    pub fn matches(&self, stats: &HostStats) -> bool {
        match self {
            OutputFilter::All => true,
            OutputFilter::OnlineOnly => stats.is_online(),
            OutputFilter::OfflineOnly => !stats.is_online(),
        }
    }

    /// Keep the matching hosts, preserving order.
    pub fn apply<S>(&self, hosts: &[S]) -> Vec<S>
    where
        S: AsRef<HostStats> + Clone,
    {
        hosts
            .iter()
            .filter(|stats| self.matches((*stats).as_ref()))
            .cloned()
            .collect()
    }
}

impl From<&OutputConfig> for OutputFilter {
    fn from(config: &OutputConfig) -> Self {
        Self::from_flags(config.only_online, config.only_offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{Target, TargetDefaults};
    use std::sync::Arc;

    fn host(name: &str, state: bool, error: &str) -> Arc<HostStats> {
        let target = Target::parse(name, &TargetDefaults::default()).unwrap();
        let mut stats = HostStats::new(&target);
        stats.state = state;
        stats.last_error_message = error.to_string();
        Arc::new(stats)
    }

    fn names(hosts: &[Arc<HostStats>]) -> Vec<&str> {
        hosts.iter().map(|h| h.host.as_str()).collect()
    }

    #[test]
    fn test_mixed_states() {
        let hosts = vec![
            host("up.example", true, ""),
            host("down.example", false, "timeout after 1000ms"),
            host("flaky.example", true, "timeout after 1000ms"),
            host("fresh.example", false, ""),
        ];

        let online = OutputFilter::OnlineOnly.apply(&hosts);
        let offline = OutputFilter::OfflineOnly.apply(&hosts);
        assert_eq!(names(&online), ["up.example"]);
        assert_eq!(names(&offline), ["down.example", "flaky.example", "fresh.example"]);
        assert_eq!(OutputFilter::All.apply(&hosts).len(), 4);
        assert_eq!(online.len() + offline.len(), hosts.len());
    }

    #[test]
    fn test_from_flags() {
        assert_eq!(OutputFilter::from_flags(false, false), OutputFilter::All);
        assert_eq!(OutputFilter::from_flags(true, false), OutputFilter::OnlineOnly);
        assert_eq!(OutputFilter::from_flags(false, true), OutputFilter::OfflineOnly);
    }
}
