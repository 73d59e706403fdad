use std::fmt;
use std::ops::{Add, Sub};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A point in time, measured in seconds since the Unix epoch.
///
/// Wraps a plain `u64` rather than [`SystemTime`] directly so tests can
/// construct arbitrary instants without touching the system clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct LocalTime(u64);

impl LocalTime {
    /// The Unix epoch.
    pub const EPOCH: LocalTime = LocalTime(0);

    /// Get the current time according to the system clock.
    pub fn now() -> Self {
        SystemTime::now().into()
    }

    /// Seconds since the Unix epoch.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Construct from a raw second count.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Elapsed duration since an earlier point in time. Saturates to zero if
    /// `earlier` is in the future relative to `self`.
    pub fn duration_since(&self, earlier: LocalTime) -> LocalDuration {
        LocalDuration::from_secs(self.0.saturating_sub(earlier.0))
    }
}

impl From<SystemTime> for LocalTime {
    fn from(t: SystemTime) -> Self {
        let secs = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        Self(secs)
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<LocalDuration> for LocalTime {
    type Output = LocalTime;

    fn add(self, rhs: LocalDuration) -> LocalTime {
        LocalTime(self.0.saturating_add(rhs.as_secs()))
    }
}

impl Sub<LocalTime> for LocalTime {
    type Output = LocalDuration;

    fn sub(self, rhs: LocalTime) -> LocalDuration {
        LocalDuration::from_secs(self.0.saturating_sub(rhs.0))
    }
}

impl Sub<LocalDuration> for LocalTime {
    type Output = LocalTime;

    fn sub(self, rhs: LocalDuration) -> LocalTime {
        LocalTime(self.0.saturating_sub(rhs.as_secs()))
    }
}

/// A span of time, measured in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct LocalDuration(u64);

impl LocalDuration {
    /// The zero duration.
    pub const ZERO: LocalDuration = LocalDuration(0);

    /// Construct from a second count.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Construct from a minute count.
    pub const fn from_mins(mins: u64) -> Self {
        Self(mins * 60)
    }

    /// Seconds in this duration.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Clamp this duration to the given inclusive range.
    pub fn clamp(self, min: LocalDuration, max: LocalDuration) -> LocalDuration {
        LocalDuration(self.0.clamp(min.0, max.0))
    }
}

impl fmt::Display for LocalDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl From<LocalDuration> for Duration {
    fn from(d: LocalDuration) -> Duration {
        Duration::from_secs(d.0)
    }
}

impl From<Duration> for LocalDuration {
    fn from(d: Duration) -> LocalDuration {
        LocalDuration(d.as_secs())
    }
}
