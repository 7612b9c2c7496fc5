//! Host reachability state machine.
//!
//! # States
//! - Unknown: no probe has completed yet
//! - Up: the host answered recently
//! - Down: the host has been silent for longer than the threshold
//!
//! # State Transitions
//! ```text
//! Unknown → Up:   first success (silent, nothing to report)
//! Down → Up:      any single success                      → DownToUp
//! Up → Down:      failure with silence > threshold        → UpToDown
//! Unknown → Down: failure with silence since first probe > threshold → UpToDown
//! ```
//!
//! # Design Decisions
//! - Asymmetric hysteresis: one success clears Down, Down needs sustained silence
//! - Pure logic: callers pass `now`, so the rules are testable without sleeping
//! - Unknown is explicit so process start never reports a spurious DownToUp

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Current reachability of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    #[default]
    Unknown,
    Up,
    Down,
}

impl Reachability {
    /// Boolean view used by snapshots: only `Up` counts as up.
    pub fn is_up(&self) -> bool {
        matches!(self, Reachability::Up)
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reachability::Unknown => f.write_str("unknown"),
            Reachability::Up => f.write_str("up"),
            Reachability::Down => f.write_str("down"),
        }
    }
}

/// A change of a host's up/down state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    #[serde(rename = "up to down")]
    UpToDown,
    #[serde(rename = "down to up")]
    DownToUp,
}

impl Transition {
    /// State after the transition.
    pub fn new_state(&self) -> bool {
        matches!(self, Transition::DownToUp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::UpToDown => "up to down",
            Transition::DownToUp => "down to up",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a stream of probe outcomes into hysteresis-filtered transitions.
#[derive(Debug, Clone)]
pub struct StateTracker {
    reachability: Reachability,
    threshold: Duration,
    first_observation: Option<Instant>,
    last_success: Option<Instant>,
    last_transition: Option<Instant>,
    consecutive_losses: u64,
    consecutive_successes: u64,
    loss_duration: Duration,
}

impl StateTracker {
    /// Create a tracker in the `Unknown` state.
    pub fn new(threshold: Duration) -> Self {
        Self {
            reachability: Reachability::Unknown,
            threshold,
            first_observation: None,
            last_success: None,
            last_transition: None,
            consecutive_losses: 0,
            consecutive_successes: 0,
            loss_duration: Duration::ZERO,
        }
    }

    /// Feed one probe outcome observed at `now`.
    ///
    /// Returns the transition it caused, if any.
    pub fn observe(&mut self, success: bool, now: Instant) -> Option<Transition> {
        self.first_observation.get_or_insert(now);

        if success {
            self.consecutive_successes += 1;
            self.consecutive_losses = 0;
            self.last_success = Some(now);

            return match self.reachability {
                Reachability::Up => None,
                Reachability::Unknown => {
                    self.reachability = Reachability::Up;
                    None
                }
                Reachability::Down => {
                    self.reachability = Reachability::Up;
                    self.last_transition = Some(now);
                    Some(Transition::DownToUp)
                }
            };
        }

        self.consecutive_losses += 1;
        self.consecutive_successes = 0;
        let silence = self.silence(now);

        match self.reachability {
            Reachability::Down => {
                self.loss_duration = silence;
                None
            }
            Reachability::Up | Reachability::Unknown if silence > self.threshold => {
                self.reachability = Reachability::Down;
                self.last_transition = Some(now);
                self.loss_duration = silence;
                Some(Transition::UpToDown)
            }
            _ => None,
        }
    }

    /// Time since the last success, or since the first probe if none succeeded.
    pub fn silence(&self, now: Instant) -> Duration {
        self.last_success
            .or(self.first_observation)
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default()
    }

    pub fn reachability(&self) -> Reachability {
        self.reachability
    }

    pub fn is_up(&self) -> bool {
        self.reachability.is_up()
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn consecutive_losses(&self) -> u64 {
        self.consecutive_losses
    }

    pub fn consecutive_successes(&self) -> u64 {
        self.consecutive_successes
    }

    pub fn last_transition(&self) -> Option<Instant> {
        self.last_transition
    }

    /// How long the host was (or has been) silent during its latest downtime.
    pub fn loss_duration(&self) -> Duration {
        self.loss_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(2);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Tracker that has seen one success at `t0`.
    fn up_at(t0: Instant) -> StateTracker {
        let mut tracker = StateTracker::new(THRESHOLD);
        assert_eq!(tracker.observe(true, t0), None);
        assert_eq!(tracker.reachability(), Reachability::Up);
        tracker
    }

    #[test]
    fn test_starts_unknown() {
        let tracker = StateTracker::new(THRESHOLD);
        assert_eq!(tracker.reachability(), Reachability::Unknown);
        assert!(!tracker.is_up());
    }

    #[test]
    fn test_first_success_is_silent() {
        let t0 = Instant::now();
        let mut tracker = StateTracker::new(THRESHOLD);
        assert_eq!(tracker.observe(true, t0), None);
        assert!(tracker.is_up());
        assert_eq!(tracker.last_transition(), None);
    }

    #[test]
    fn test_threshold_boundary() {
        let t0 = Instant::now();

        let mut tracker = up_at(t0);
        assert_eq!(tracker.observe(false, t0 + ms(1000)), None);
        assert_eq!(tracker.observe(false, t0 + ms(1999)), None);
        assert_eq!(tracker.observe(false, t0 + ms(2000)), None);
        assert!(tracker.is_up());

        assert_eq!(tracker.observe(false, t0 + ms(2001)), Some(Transition::UpToDown));
        assert_eq!(tracker.reachability(), Reachability::Down);
        assert_eq!(tracker.loss_duration(), ms(2001));
        assert_eq!(tracker.consecutive_losses(), 4);
    }

    #[test]
    fn test_single_success_clears_down() {
        let t0 = Instant::now();
        let mut tracker = up_at(t0);
        for i in 1..=50 {
            tracker.observe(false, t0 + ms(i * 1000));
        }
        assert_eq!(tracker.reachability(), Reachability::Down);
        assert_eq!(tracker.consecutive_losses(), 50);

        assert_eq!(tracker.observe(true, t0 + ms(51_000)), Some(Transition::DownToUp));
        assert!(tracker.is_up());
        assert_eq!(tracker.consecutive_losses(), 0);
        assert_eq!(tracker.consecutive_successes(), 1);
    }

    #[test]
    fn test_settled_states_emit_nothing_more() {
        let t0 = Instant::now();
        let mut tracker = up_at(t0);
        for i in 1..=10 {
            assert_eq!(tracker.observe(true, t0 + ms(i * 500)), None);
        }

        let mut transitions = Vec::new();
        for i in 1..=20 {
            transitions.extend(tracker.observe(false, t0 + ms(5000 + i * 500)));
        }
        assert_eq!(transitions, vec![Transition::UpToDown]);
    }

    #[test]
    fn test_loss_duration_grows_while_down_and_freezes_after() {
        let t0 = Instant::now();
        let mut tracker = up_at(t0);
        tracker.observe(false, t0 + ms(3000));
        assert_eq!(tracker.loss_duration(), ms(3000));

        tracker.observe(false, t0 + ms(7000));
        assert_eq!(tracker.loss_duration(), ms(7000));

        tracker.observe(true, t0 + ms(8000));
        assert_eq!(tracker.loss_duration(), ms(7000));
    }

    #[test]
    fn test_unknown_host_goes_down_after_threshold() {
        let t0 = Instant::now();
        let mut tracker = StateTracker::new(THRESHOLD);
        assert_eq!(tracker.observe(false, t0), None);
        assert_eq!(tracker.observe(false, t0 + ms(2000)), None);
        assert_eq!(tracker.reachability(), Reachability::Unknown);

        assert_eq!(tracker.observe(false, t0 + ms(3000)), Some(Transition::UpToDown));
        assert_eq!(tracker.reachability(), Reachability::Down);
    }

    #[test]
    fn test_isolated_loss_does_not_flap() {
        let t0 = Instant::now();
        let mut tracker = up_at(t0);
        let mut transitions = 0;
        for i in 1..=100u64 {
            let success = i % 2 == 0;
            if tracker.observe(success, t0 + ms(i * 1000)).is_some() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 0);
    }

    #[test]
    fn test_transition_serialization() {
        assert_eq!(serde_json::to_string(&Transition::UpToDown).unwrap(), "\"up to down\"");
        assert_eq!(serde_json::to_string(&Transition::DownToUp).unwrap(), "\"down to up\"");
        assert!(Transition::DownToUp.new_state());
        assert!(!Transition::UpToDown.new_state());
    }
}
