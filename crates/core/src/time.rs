use chrono::{DateTime, Utc};

use crate::metrics::MonthBucket;

/// Time source for services. Reports and submission stamps read "now" only through this.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Builds a clock from an optional RFC 3339 override, falling back to system time.
    ///
    /// # Errors
    ///
    /// Returns the chrono parse error when the override is malformed.
    pub fn from_rfc3339(raw: Option<&str>) -> Result<Self, chrono::ParseError> {
        match raw {
            Some(raw) => {
                let at = DateTime::parse_from_rfc3339(raw.trim())?.with_timezone(&Utc);
                Ok(Self::Fixed(at))
            }
            None => Ok(Self::Default),
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Calendar month containing `now()`.
    #[must_use]
    pub fn current_month(&self) -> MonthBucket {
        MonthBucket::containing(self.now())
    }
}

/// Deterministic timestamp for tests (2025-03-15T09:00:00Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_742_029_200;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
