use time::{Duration, PrimitiveDateTime};

/// Moment the exam timer runs out for an attempt.
pub(crate) fn attempt_deadline(
    started_at: PrimitiveDateTime,
    duration_minutes: i32,
) -> PrimitiveDateTime {
    started_at + Duration::minutes(i64::from(duration_minutes.max(0)))
}

/// Latest moment a submission is still accepted. The grace absorbs network jitter
/// around the client-side timer.
pub(crate) fn submission_cutoff(
    started_at: PrimitiveDateTime,
    duration_minutes: i32,
    grace_seconds: i64,
) -> PrimitiveDateTime {
    attempt_deadline(started_at, duration_minutes) + Duration::seconds(grace_seconds.max(0))
}

pub(crate) fn accepts_submission(
    started_at: PrimitiveDateTime,
    duration_minutes: i32,
    grace_seconds: i64,
    now: PrimitiveDateTime,
) -> bool {
    now <= submission_cutoff(started_at, duration_minutes, grace_seconds)
}

pub(crate) fn remaining_seconds(
    started_at: PrimitiveDateTime,
    duration_minutes: i32,
    now: PrimitiveDateTime,
) -> i64 {
    (attempt_deadline(started_at, duration_minutes) - now).whole_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn deadline_adds_duration() {
        let started = datetime!(2025-03-01 10:00:00);
        assert_eq!(attempt_deadline(started, 30), datetime!(2025-03-01 10:30:00));
        assert_eq!(submission_cutoff(started, 30, 300), datetime!(2025-03-01 10:35:00));
    }

    #[test]
    fn submission_inside_grace_is_accepted() {
        let started = datetime!(2025-03-01 10:00:00);

        assert!(accepts_submission(started, 30, 300, datetime!(2025-03-01 10:29:59)));
        assert!(accepts_submission(started, 30, 300, datetime!(2025-03-01 10:35:00)));
        assert!(!accepts_submission(started, 30, 300, datetime!(2025-03-01 10:35:01)));
    }

    #[test]
    fn zero_grace_closes_at_deadline() {
        let started = datetime!(2025-03-01 10:00:00);

        assert!(accepts_submission(started, 5, 0, datetime!(2025-03-01 10:05:00)));
        assert!(!accepts_submission(started, 5, 0, datetime!(2025-03-01 10:05:01)));
    }

    #[test]
    fn remaining_time_never_goes_negative() {
        let started = datetime!(2025-03-01 10:00:00);

        assert_eq!(remaining_seconds(started, 10, datetime!(2025-03-01 10:09:00)), 60);
        assert_eq!(remaining_seconds(started, 10, datetime!(2025-03-01 11:00:00)), 0);
    }
}
