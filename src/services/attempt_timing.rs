// src/services/attempt_timing.rs

use chrono::{DateTime, Duration, Utc};

use crate::models::attempt::AttemptStatus;

/// Deadline of an attempt started at `started_at`.
pub fn compute_expiry(started_at: DateTime<Utc>, duration_minutes: i32) -> DateTime<Utc> {
    started_at + Duration::minutes(duration_minutes.max(0) as i64)
}

/// Final status for a submission arriving at `now`.
///
/// A submission is automatic when the client's countdown fired or when the
/// server clock has reached the deadline, whichever the client claims.
pub fn final_status(now: DateTime<Utc>, expires_at: DateTime<Utc>, timed_out: bool) -> AttemptStatus {
    if timed_out || now >= expires_at {
        AttemptStatus::AutoSubmitted
    } else {
        AttemptStatus::Submitted
    }
}

/// Seconds left before the deadline, never negative.
pub fn remaining_seconds(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> i64 {
    (expires_at - now).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn expiry_adds_duration() {
        assert_eq!(compute_expiry(t0(), 10), t0() + Duration::minutes(10));
    }

    #[test]
    fn submission_before_deadline_is_manual() {
        let expires = compute_expiry(t0(), 10);
        let now = t0() + Duration::minutes(4);
        assert_eq!(final_status(now, expires, false), AttemptStatus::Submitted);
        assert_eq!(remaining_seconds(now, expires), 360);
    }

    #[test]
    fn submission_at_or_after_deadline_is_automatic() {
        let expires = compute_expiry(t0(), 10);
        assert_eq!(final_status(expires, expires, false), AttemptStatus::AutoSubmitted);
        assert_eq!(
            final_status(expires + Duration::seconds(5), expires, false),
            AttemptStatus::AutoSubmitted
        );
        assert_eq!(remaining_seconds(expires + Duration::seconds(5), expires), 0);
    }

    #[test]
    fn client_timeout_flag_forces_automatic() {
        let expires = compute_expiry(t0(), 10);
        assert_eq!(final_status(t0(), expires, true), AttemptStatus::AutoSubmitted);
    }
}
