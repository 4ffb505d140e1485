//! Leading options — registration and leadership time limits.

use std::fmt;
use std::time::Duration;

use crate::error::{LifecycleError, LifecycleResult};

/// How long the leader may wait for registration and how long it may lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadingOptions {
    /// Maximum time to wait for the resource manager to confirm registration.
    pub registration_delay_limit: Duration,
    /// Maximum time to serve as leader before abdicating.
    pub leading_time_limit: Duration,
}

impl Default for LeadingOptions {
    fn default() -> Self {
        Self {
            registration_delay_limit: Duration::from_secs(60),
            leading_time_limit: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl LeadingOptions {
    pub fn new(registration_delay_limit: Duration, leading_time_limit: Duration) -> Self {
        Self {
            registration_delay_limit,
            leading_time_limit,
        }
    }

    /// Build from signed millisecond values; negative limits are rejected.
    pub fn try_from_millis(registration_delay_ms: i64, leading_time_ms: i64) -> LifecycleResult<Self> {
        Ok(Self {
            registration_delay_limit: non_negative("registration delay limit", registration_delay_ms)?,
            leading_time_limit: non_negative("leading time limit", leading_time_ms)?,
        })
    }

    /// Build from human duration strings such as `"90s"` or `"1d"`.
    pub fn parse(registration_delay_limit: &str, leading_time_limit: &str) -> LifecycleResult<Self> {
        Self::try_from_millis(
            parse_millis("registration delay limit", registration_delay_limit)?,
            parse_millis("leading time limit", leading_time_limit)?,
        )
    }
}

impl fmt::Display for LeadingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "registration within {:?}, lead for at most {:?}",
            self.registration_delay_limit, self.leading_time_limit
        )
    }
}

fn non_negative(what: &str, millis: i64) -> LifecycleResult<Duration> {
    u64::try_from(millis)
        .map(Duration::from_millis)
        .map_err(|_| LifecycleError::InvalidOptions(format!("{what} must be non-negative, got {millis}ms")))
}

/// Parse `500ms`, `30s`, `5m`, `2h`, `1d`, or bare seconds into signed millis.
fn parse_millis(what: &str, s: &str) -> LifecycleResult<i64> {
    let s = s.trim();
    let invalid = || LifecycleError::InvalidOptions(format!("{what}: cannot parse duration {s:?}"));

    let (digits, unit_ms) = if let Some(v) = s.strip_suffix("ms") {
        (v, 1)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1_000)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60_000)
    } else if let Some(v) = s.strip_suffix('h') {
        (v, 3_600_000)
    } else if let Some(v) = s.strip_suffix('d') {
        (v, 86_400_000)
    } else {
        (s, 1_000)
    };

    let value: i64 = digits.trim().parse().map_err(|_| invalid())?;
    value.checked_mul(unit_ms).ok_or_else(invalid)
}
