// SPDX-License-Identifier: AGPL-3.0-only

//! Millisecond time source for the completion poll loop
//!
//! [`MonotonicClock`] is the normal choice. [`StepClock`] is the fallback for
//! targets without a usable system timer: it counts calls instead of
//! milliseconds, so a timeout of `T` becomes a budget of roughly `T` clock
//! reads. That mode is reported through [`Clock::is_degraded`] so callers and
//! tests can tell the two apart.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic millisecond clock.
pub trait Clock: Debug + Send {
    /// Milliseconds since an arbitrary fixed origin. Never decreases.
    fn now_ms(&self) -> u64;

    /// Block the calling thread for at least `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);

    /// `true` when [`now_ms`](Self::now_ms) counts calls rather than
    /// wall-clock milliseconds.
    fn is_degraded(&self) -> bool {
        false
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn sleep_ms(&self, ms: u64) {
        (**self).sleep_ms(ms);
    }

    fn is_degraded(&self) -> bool {
        (**self).is_degraded()
    }
}

/// Wall-clock time from [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Busy-wait rounds per requested millisecond in [`StepClock::sleep_ms`].
pub const SPINS_PER_MS: u64 = 1000;

/// Logical clock for targets without a timer.
///
/// Every [`now_ms`](Clock::now_ms) call returns a value one greater than the
/// previous call. Sleeping spins the CPU and does not advance the counter.
#[derive(Debug, Default)]
pub struct StepClock {
    ticks: AtomicU64,
}

impl StepClock {
    /// Counter starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Number of `now_ms` calls so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Clock for StepClock {
    fn now_ms(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn sleep_ms(&self, ms: u64) {
        for _ in 0..ms.saturating_mul(SPINS_PER_MS) {
            std::hint::spin_loop();
        }
    }

    fn is_degraded(&self) -> bool {
        true
    }
}

/// Time source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockKind {
    /// [`MonotonicClock`]
    #[default]
    Monotonic,
    /// [`StepClock`] (degraded, iteration-count timeouts)
    Step,
}

impl std::str::FromStr for ClockKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monotonic" | "wall" => Ok(Self::Monotonic),
            "step" | "counter" => Ok(Self::Step),
            other => Err(format!("unknown clock '{other}' (expected monotonic or step)")),
        }
    }
}

/// Build the clock named by `kind`.
#[must_use]
pub fn select_clock(kind: ClockKind) -> Box<dyn Clock> {
    match kind {
        ClockKind::Monotonic => Box::new(MonotonicClock::new()),
        ClockKind::Step => {
            tracing::warn!("No wall clock selected: timeouts count poll iterations, not milliseconds");
            Box::new(StepClock::new())
        }
    }
}
