#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Embassy time base adapted to the `line-core` instant traits.

use core::ops::Add;
use core::time::Duration;

use embassy_time::{Duration as EmbassyDuration, Instant};
#[cfg(target_os = "none")]
use line_core::monitor::MonotonicClock;
use line_core::telemetry::TelemetryInstant;

/// Embassy [`Instant`] usable as a monitor timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    /// Reads the Embassy time driver.
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        let rhs = EmbassyDuration::from_micros(micros);
        Self(self.0.checked_add(rhs).unwrap_or(Instant::MAX))
    }
}

/// Converts a monitor duration into an Embassy timer duration.
pub fn to_embassy(duration: Duration) -> EmbassyDuration {
    EmbassyDuration::from_micros(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}

/// Clock backed by the Embassy time driver.
#[cfg(target_os = "none")]
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbassyClock;

#[cfg(target_os = "none")]
impl MonotonicClock for EmbassyClock {
    type Instant = FirmwareInstant;

    fn now(&self) -> FirmwareInstant {
        FirmwareInstant::now()
    }
}
