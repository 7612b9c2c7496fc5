//! Probe backed by the operating system's `ping` executable.
//!
//! Useful where raw ICMP sockets are not permitted but the setuid `ping`
//! binary is available.

use std::io::ErrorKind;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::{timeout, Instant};

use crate::probe::resolve::resolve;
use crate::probe::{Probe, ProbeError, ProbeKind, ProbeResult, Target};

/// Runs `ping` for a single echo and parses the reported round-trip time.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    command: String,
}

impl SystemProbe {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn build_command(&self, ip: IpAddr, limit: Duration) -> Command {
        let mut cmd = Command::new(&self.command);
        for arg in ping_args(ip, limit) {
            cmd.arg(arg);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new("ping")
    }
}

#[async_trait]
impl Probe for SystemProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::System
    }

    async fn run(&self, target: &Target, limit: Duration) -> ProbeResult {
        let deadline = Instant::now() + limit;

        let ip = match resolve(target, limit).await {
            Ok(ip) => ip,
            Err(e) => return ProbeResult::failure(e, None),
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let start = Instant::now();

        // kill_on_drop reaps the child if the timeout fires first.
        let output = match timeout(remaining, self.build_command(ip, remaining).output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ProbeResult::failure(classify_spawn_error(&self.command, &e), Some(ip)),
            Err(_) => return ProbeResult::failure(ProbeError::Timeout(limit), Some(ip)),
        };
        let elapsed = start.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return ProbeResult::failure(classify_exit(&stdout, &stderr, limit), Some(ip));
        }

        // Fall back to wall time when the output format is unfamiliar.
        let rtt = parse_rtt(&stdout).unwrap_or(elapsed);
        ProbeResult::success(rtt, ip)
    }
}

#[cfg(target_os = "windows")]
fn ping_args(ip: IpAddr, limit: Duration) -> Vec<String> {
    let family = if ip.is_ipv6() { "-6" } else { "-4" };
    vec![
        family.into(),
        "-n".into(),
        "1".into(),
        "-w".into(),
        limit.as_millis().max(1).to_string(),
        ip.to_string(),
    ]
}

#[cfg(target_os = "macos")]
fn ping_args(ip: IpAddr, limit: Duration) -> Vec<String> {
    // macOS ping6 has no wait flag; the outer timeout bounds it.
    if ip.is_ipv6() {
        return vec!["-6".into(), "-c".into(), "1".into(), ip.to_string()];
    }
    vec![
        "-n".into(),
        "-c".into(),
        "1".into(),
        "-W".into(),
        limit.as_millis().max(1).to_string(),
        ip.to_string(),
    ]
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn ping_args(ip: IpAddr, limit: Duration) -> Vec<String> {
    let family = if ip.is_ipv6() { "-6" } else { "-4" };
    vec![
        family.into(),
        "-n".into(),
        "-c".into(),
        "1".into(),
        "-W".into(),
        limit.as_secs_f64().ceil().max(1.0).to_string(),
        ip.to_string(),
    ]
}

fn classify_spawn_error(command: &str, e: &std::io::Error) -> ProbeError {
    match e.kind() {
        ErrorKind::NotFound => ProbeError::Setup(format!("`{command}` not found")),
        ErrorKind::PermissionDenied => ProbeError::Setup(format!("cannot execute `{command}`: {e}")),
        _ => ProbeError::Setup(format!("failed to run `{command}`: {e}")),
    }
}

fn classify_exit(stdout: &str, stderr: &str, limit: Duration) -> ProbeError {
    let combined = format!("{stdout}\n{stderr}").to_ascii_lowercase();
    if combined.contains("operation not permitted") || combined.contains("permission denied") {
        ProbeError::Setup(first_line(stderr).unwrap_or("permission denied").to_string())
    } else if combined.contains("unknown host") || combined.contains("could not find host") {
        ProbeError::Resolve(first_line(stderr).unwrap_or("unknown host").to_string())
    } else if combined.contains("unreachable") {
        ProbeError::Unreachable("destination unreachable".into())
    } else {
        ProbeError::Timeout(limit)
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

/// Extract the round-trip time from `ping` output.
///
/// Understands `time=12.3 ms`, `time=12ms` and `time<1ms`.
pub fn parse_rtt(output: &str) -> Option<Duration> {
    output.lines().find_map(|line| {
        let idx = line.find("time=").or_else(|| line.find("time<"))?;
        let rest = &line[idx + 5..];
        let end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let ms: f64 = rest[..end].parse().ok()?;
        if ms.is_finite() && ms >= 0.0 {
            Some(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
        } else {
            None
        }
    })
}
