//! Bounded polling

use crate::error::{Result, SwitchError};
use std::time::Duration;
use tracing::warn;

/// Attempt budget and delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Probes before giving up
    pub attempts: u32,
    /// Sleep after every unsuccessful check
    pub interval: Duration,
}

/// CRM run/stop handshake: 100 polls, 1 ms apart
pub const CRM_POLL: PollPolicy = PollPolicy {
    attempts: 100,
    interval: Duration::from_millis(1),
};

/// Call `ready` until it returns `true` or the policy's attempts run out
///
/// Returns the number of checks performed on success.
///
/// # Errors
///
/// Returns `OperationTimedOut` when every attempt saw `false`, or the first
/// error returned by `ready`.
pub fn poll_until<F>(policy: PollPolicy, operation: &'static str, mut ready: F) -> Result<u32>
where
    F: FnMut() -> Result<bool>,
{
    for attempt in 1..=policy.attempts {
        if ready()? {
            return Ok(attempt);
        }
        if !policy.interval.is_zero() {
            std::thread::sleep(policy.interval);
        }
    }
    warn!("{operation}: no response after {} polls", policy.attempts);
    Err(SwitchError::OperationTimedOut {
        operation,
        attempts: policy.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: PollPolicy = PollPolicy {
        attempts: 5,
        interval: Duration::ZERO,
    };

    #[test]
    fn succeeds_on_the_check_that_sees_true() {
        let mut calls = 0;
        let polls = poll_until(FAST, "test", || {
            calls += 1;
            Ok(calls == 3)
        })
        .unwrap();
        assert_eq!(polls, 3);
    }

    #[test]
    fn exhausted_budget_times_out() {
        let mut calls = 0;
        let err = poll_until(FAST, "stuck", || {
            calls += 1;
            Ok(false)
        })
        .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(calls, 5);
        assert!(err.to_string().contains("stuck"));
    }

    #[test]
    fn check_error_stops_polling() {
        let mut calls = 0;
        let err = poll_until(FAST, "faulty", || {
            calls += 1;
            Err(SwitchError::bus(0x10, "gone"))
        })
        .unwrap_err();
        assert!(matches!(err, SwitchError::Bus { addr: 0x10, .. }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn crm_budget_is_100_by_1ms() {
        assert_eq!(CRM_POLL.attempts, 100);
        assert_eq!(CRM_POLL.interval, Duration::from_millis(1));
    }
}
