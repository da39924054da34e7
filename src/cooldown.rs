use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::traits::Clock;

pub const MINUTE_MS: u64 = 60 * 1000;
pub const HOUR_MS: u64 = 60 * MINUTE_MS;
pub const DAY_MS: u64 = 24 * HOUR_MS;
pub const WEEK_MS: u64 = 7 * DAY_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimCheck {
    Ready,
    Wait { remaining_ms: u64 },
}

/// Readiness of an action whose last claim happened at `last_ms`.
/// A zero `last_ms` means never claimed. The remaining wait is always
/// in (0, period_ms].
pub fn check(last_ms: u64, now_ms: u64, period_ms: u64) -> ClaimCheck {
    if last_ms == 0 {
        return ClaimCheck::Ready;
    }
    let elapsed = now_ms.saturating_sub(last_ms);
    if elapsed >= period_ms {
        ClaimCheck::Ready
    } else {
        ClaimCheck::Wait {
            remaining_ms: period_ms - elapsed,
        }
    }
}

/// Human wait text, rounded up to the whole unit matching the period's
/// scale: minutes for periods up to an hour, hours for day-scale periods,
/// days for week-scale periods.
pub fn format_wait(period_ms: u64, remaining_ms: u64) -> String {
    let (unit_ms, unit) = if period_ms >= WEEK_MS {
        (DAY_MS, "day")
    } else if period_ms >= DAY_MS {
        (HOUR_MS, "hour")
    } else {
        (MINUTE_MS, "minute")
    };
    let count = remaining_ms.div_ceil(unit_ms);
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Test clock whose time only moves when told to.
#[cfg(test)]
pub(crate) struct ManualClock(std::sync::atomic::AtomicU64);

#[cfg(test)]
impl ManualClock {
    pub(crate) fn at(ms: u64) -> Self {
        Self(std::sync::atomic::AtomicU64::new(ms))
    }

    pub(crate) fn set(&self, ms: u64) {
        self.0.store(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
