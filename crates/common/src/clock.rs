//! Wall-clock abstraction so deadline checks can be driven from tests.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Shared clock handle.
pub type ClockService = Arc<dyn Clock>;

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Whether a mutation at `now` falls after `deadline`.
///
/// A mutation landing exactly on the deadline is still accepted.
#[must_use]
pub fn deadline_passed(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    deadline.is_some_and(|d| now > d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_deadline_boundary() {
        let now = Utc::now();
        assert!(!deadline_passed(None, now));
        assert!(!deadline_passed(Some(now), now));
        assert!(!deadline_passed(Some(now + Duration::seconds(1)), now));
        assert!(deadline_passed(Some(now - Duration::seconds(1)), now));
    }

    #[test]
    fn test_fixed_clock() {
        let instant = Utc::now() - Duration::days(3);
        assert_eq!(FixedClock(instant).now(), instant);
    }
}
