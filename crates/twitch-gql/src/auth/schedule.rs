use std::fmt;

use serde::Serialize;

use super::device::PollOutcome;

/// Total polling window in interval units: at most `300 / interval` attempts.
pub const POLL_WINDOW_SECS: u64 = 300;

/// Why a device-code login ended without a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceAuthFailure {
    /// Upstream reported `expired_token`, or the code's lifetime ran out.
    Expired,
    /// The user declined the authorization.
    Denied,
    /// The attempt budget ran out while still pending.
    Exhausted { attempts: u32 },
    Cancelled,
}

impl fmt::Display for DeviceAuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => f.write_str("device code expired"),
            Self::Denied => f.write_str("authorization denied by user"),
            Self::Exhausted { attempts } => {
                write!(f, "no authorization after {attempts} attempts")
            }
            Self::Cancelled => f.write_str("polling cancelled"),
        }
    }
}

/// Observable state of the background token poll.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollStatus {
    #[default]
    Idle,
    Pending,
    Authenticated,
    Failed { reason: DeviceAuthFailure },
}

impl PollStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// What the poll loop should do after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Retry,
    Authenticated,
    Failed(DeviceAuthFailure),
}

/// Attempt budget and backoff for the device-code poll.
///
/// Waits are expressed in seconds; the controller scales them by its poll
/// unit. `slow_down` grows the wait by one interval each time it is seen.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: u64,
    wait: u64,
    attempts: u32,
    max_attempts: u32,
}

impl PollSchedule {
    pub fn new(interval_secs: u64) -> Self {
        let interval = interval_secs.max(1);
        let max_attempts = (POLL_WINDOW_SECS / interval).max(1);
        Self {
            interval,
            wait: interval,
            attempts: 0,
            max_attempts: u32::try_from(max_attempts).unwrap_or(u32::MAX),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Seconds to sleep before the next attempt, or `None` once the budget
    /// is spent.
    pub fn next_wait(&mut self) -> Option<u64> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.wait)
    }

    pub fn observe(&mut self, outcome: &PollOutcome) -> Transition {
        match outcome {
            PollOutcome::Granted(_) => Transition::Authenticated,
            PollOutcome::Pending | PollOutcome::Transient(_) => Transition::Retry,
            PollOutcome::SlowDown => {
                self.wait += self.interval;
                Transition::Retry
            }
            PollOutcome::Expired => Transition::Failed(DeviceAuthFailure::Expired),
            PollOutcome::Denied => Transition::Failed(DeviceAuthFailure::Denied),
        }
    }

    /// Failure to report when [`next_wait`](Self::next_wait) returns `None`.
    pub fn exhausted(&self) -> DeviceAuthFailure {
        DeviceAuthFailure::Exhausted {
            attempts: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenGrant;

    #[test]
    fn budget_is_window_over_interval() {
        assert_eq!(PollSchedule::new(5).max_attempts(), 60);
        assert_eq!(PollSchedule::new(1).max_attempts(), 300);
        assert_eq!(PollSchedule::new(600).max_attempts(), 1);
        // zero interval is clamped rather than dividing by zero
        assert_eq!(PollSchedule::new(0).max_attempts(), 300);
    }

    #[test]
    fn pending_until_exhausted() {
        let mut schedule = PollSchedule::new(100);
        let mut waits = Vec::new();
        while let Some(wait) = schedule.next_wait() {
            waits.push(wait);
            assert_eq!(schedule.observe(&PollOutcome::Pending), Transition::Retry);
        }
        assert_eq!(waits, vec![100, 100, 100]);
        assert_eq!(
            schedule.exhausted(),
            DeviceAuthFailure::Exhausted { attempts: 3 }
        );
    }

    #[test]
    fn slow_down_strictly_increases_wait() {
        let mut schedule = PollSchedule::new(5);
        let first = schedule.next_wait().unwrap();
        schedule.observe(&PollOutcome::SlowDown);
        let second = schedule.next_wait().unwrap();
        schedule.observe(&PollOutcome::SlowDown);
        let third = schedule.next_wait().unwrap();
        schedule.observe(&PollOutcome::Pending);
        let fourth = schedule.next_wait().unwrap();

        assert_eq!((first, second, third, fourth), (5, 10, 15, 15));
    }

    #[test]
    fn terminal_outcomes() {
        let mut schedule = PollSchedule::new(5);
        assert_eq!(
            schedule.observe(&PollOutcome::Expired),
            Transition::Failed(DeviceAuthFailure::Expired)
        );
        assert_eq!(
            schedule.observe(&PollOutcome::Denied),
            Transition::Failed(DeviceAuthFailure::Denied)
        );
        let grant = TokenGrant {
            access_token: "tok".into(),
            refresh_token: None,
            expires_in: None,
            user_id: None,
        };
        assert_eq!(
            schedule.observe(&PollOutcome::Granted(grant)),
            Transition::Authenticated
        );
        assert_eq!(
            schedule.observe(&PollOutcome::Transient("boom".into())),
            Transition::Retry
        );
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let failed = PollStatus::Failed {
            reason: DeviceAuthFailure::Exhausted { attempts: 2 },
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"state": "failed", "reason": {"kind": "exhausted", "attempts": 2}})
        );
        assert_eq!(
            serde_json::to_value(PollStatus::Idle).unwrap(),
            serde_json::json!({"state": "idle"})
        );
    }
}
