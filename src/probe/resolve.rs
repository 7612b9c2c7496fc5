//! Name resolution for probe targets.

use std::net::IpAddr;
use std::time::Duration;

use tokio::net::lookup_host;
use tokio::time::timeout;

use crate::probe::{ProbeError, Target};

/// Resolve a target to a single address honoring its family hint.
///
/// Literal addresses never touch DNS. Lookups are bounded by `limit`.
pub async fn resolve(target: &Target, limit: Duration) -> Result<IpAddr, ProbeError> {
    if let Some(ip) = target.literal_ip() {
        return Ok(ip);
    }

    let lookup = lookup_host((target.host.as_str(), 0));
    let addrs = match timeout(limit, lookup).await {
        Ok(Ok(addrs)) => addrs,
        Ok(Err(e)) => return Err(ProbeError::Resolve(format!("{}: {}", target.host, e))),
        Err(_) => return Err(ProbeError::Timeout(limit)),
    };

    addrs
        .map(|sa| sa.ip())
        .find(|ip| target.family.admits(ip))
        .ok_or_else(|| {
            ProbeError::Resolve(format!("{}: no {} address found", target.host, target.family))
        })
}
