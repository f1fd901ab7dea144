use super::{AtomicCounter, AtomicRate, StripedAdder, TimeUnit};
use crate::error::{MeterError, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
const SECONDS_PER_MINUTE: f64 = 60.0;
const ONE_MINUTE: f64 = 1.0;
const FIVE_MINUTES: f64 = 5.0;
const FIFTEEN_MINUTES: f64 = 15.0;
const DEFAULT_TICK: Duration = Duration::from_secs(5);

static DEFAULT_INTERVAL: Lazy<TickInterval> = Lazy::new(|| TickInterval::derive(DEFAULT_TICK));

/// Tick period of a [`Meter`] together with the EWMA decay constants derived
/// from it.
///
/// Each constant is `1 - exp(-I / 60 / W)` for an interval `I` in seconds and a
/// window `W` in minutes, evaluated in that order so the default five second
/// interval reproduces the reference constants bit for bit.
#[derive(Clone, Copy, Debug)]
pub struct TickInterval {
    duration: Duration,
    nanos: f64,
    m1_alpha: f64,
    m5_alpha: f64,
    m15_alpha: f64,
}

impl TickInterval {
    pub fn new(duration: Duration) -> Result<Self> {
        if duration.is_zero() {
            return Err(MeterError::InvalidInterval(duration));
        }
        Ok(Self::derive(duration))
    }

    fn derive(duration: Duration) -> Self {
        let secs = duration.as_secs_f64();
        let alpha = |minutes: f64| 1.0 - (-secs / SECONDS_PER_MINUTE / minutes).exp();
        Self {
            duration,
            nanos: duration.as_nanos() as f64,
            m1_alpha: alpha(ONE_MINUTE),
            m5_alpha: alpha(FIVE_MINUTES),
            m15_alpha: alpha(FIFTEEN_MINUTES),
        }
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[inline]
    pub fn one_minute_alpha(&self) -> f64 {
        self.m1_alpha
    }

    #[inline]
    pub fn five_minute_alpha(&self) -> f64 {
        self.m5_alpha
    }

    #[inline]
    pub fn fifteen_minute_alpha(&self) -> f64 {
        self.m15_alpha
    }
}

impl Default for TickInterval {
    fn default() -> Self {
        *DEFAULT_INTERVAL
    }
}

impl PartialEq for TickInterval {
    fn eq(&self, other: &Self) -> bool {
        self.duration == other.duration
    }
}

impl Eq for TickInterval {}

/// Point-in-time reading of a [`Meter`]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeterValue {
    pub count: i64,
    pub mean_rate: f64,
    pub one_minute_rate: f64,
    pub five_minute_rate: f64,
    pub fifteen_minute_rate: f64,
    pub rate_unit: TimeUnit,
}

impl MeterValue {
    /// Re-expresses every rate as events per `unit`, the count is untouched
    pub fn scale(self, unit: TimeUnit) -> MeterValue {
        if unit == self.rate_unit {
            return self;
        }
        let factor = unit.as_secs_f64() / self.rate_unit.as_secs_f64();
        MeterValue {
            count: self.count,
            mean_rate: self.mean_rate * factor,
            one_minute_rate: self.one_minute_rate * factor,
            five_minute_rate: self.five_minute_rate * factor,
            fifteen_minute_rate: self.fifteen_minute_rate * factor,
            rate_unit: unit,
        }
    }
}

impl Default for MeterValue {
    fn default() -> Self {
        Self {
            count: 0,
            mean_rate: 0.0,
            one_minute_rate: 0.0,
            five_minute_rate: 0.0,
            fifteen_minute_rate: 0.0,
            rate_unit: TimeUnit::Seconds,
        }
    }
}

impl fmt::Display for MeterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.rate_unit;
        write!(
            f,
            "count={} mean={}/{} m1={}/{} m5={}/{} m15={}/{}",
            self.count,
            self.mean_rate,
            unit,
            self.one_minute_rate,
            unit,
            self.five_minute_rate,
            unit,
            self.fifteen_minute_rate,
            unit
        )
    }
}

/// Measures the rate at which a set of events occur.
///
/// Producers [`mark`](Meter::mark) events from any thread without locking; a
/// single scheduler calls [`tick`](Meter::tick) once per [`TickInterval`] to
/// fold pending events into the total and advance the 1, 5 and 15 minute
/// moving averages. Rates are kept in events per nanosecond and only converted
/// to events per second when read.
///
/// The fields are updated independently, so a [`MeterValue`] may combine a
/// count and rates observed at slightly different instants.
pub struct Meter {
    uncounted: StripedAdder,
    total: AtomicCounter,
    m1_rate: AtomicRate,
    m5_rate: AtomicRate,
    m15_rate: AtomicRate,
    // Set on the first tick; doubles as the per-meter tick lock.
    initialized: Mutex<bool>,
    interval: TickInterval,
}

impl Meter {
    pub fn new() -> Self {
        Self::with_interval(TickInterval::default())
    }

    pub fn with_interval(interval: TickInterval) -> Self {
        Self {
            uncounted: StripedAdder::new(),
            total: AtomicCounter::default(),
            m1_rate: AtomicRate::default(),
            m5_rate: AtomicRate::default(),
            m15_rate: AtomicRate::default(),
            initialized: Mutex::new(false),
            interval,
        }
    }

    #[inline]
    pub fn interval(&self) -> &TickInterval {
        &self.interval
    }

    /// Records `count` events. Negative counts are not supported.
    #[inline]
    pub fn mark(&self, count: i64) {
        self.uncounted.add(count);
    }

    #[inline]
    pub fn mark_one(&self) {
        self.mark(1);
    }

    /// Drains pending events and advances the moving averages by one interval
    pub fn tick(&self) {
        let mut initialized = self.initialized.lock();

        let count = self.uncounted.get_and_reset();
        self.total.add(count);
        let instant_rate = count as f64 / self.interval.nanos;

        if *initialized {
            decay(&self.m1_rate, self.interval.m1_alpha, instant_rate);
            decay(&self.m5_rate, self.interval.m5_alpha, instant_rate);
            decay(&self.m15_rate, self.interval.m15_alpha, instant_rate);
        } else {
            self.m1_rate.set(instant_rate);
            self.m5_rate.set(instant_rate);
            self.m15_rate.set(instant_rate);
            *initialized = true;
        }
    }

    /// Total of ticked and pending events
    #[inline]
    pub fn count(&self) -> i64 {
        self.total.get() + self.uncounted.get()
    }

    /// Reads the meter. `elapsed` is the time since the meter was created and is
    /// only used for the mean rate.
    pub fn value(&self, elapsed: Duration) -> MeterValue {
        let count = self.count();
        let mean_rate = if count == 0 {
            0.0
        } else {
            count as f64 / elapsed.as_secs_f64()
        };
        MeterValue {
            count,
            mean_rate,
            one_minute_rate: self.m1_rate.get() * NANOS_PER_SECOND,
            five_minute_rate: self.m5_rate.get() * NANOS_PER_SECOND,
            fifteen_minute_rate: self.m15_rate.get() * NANOS_PER_SECOND,
            rate_unit: TimeUnit::Seconds,
        }
    }

    /// Zeroes the count and every rate.
    ///
    /// The meter stays initialized: the next tick blends against a zero rate
    /// instead of seeding the averages with the instant rate.
    pub fn reset(&self) {
        self.uncounted.reset();
        self.total.set(0);
        self.m1_rate.set(0.0);
        self.m5_rate.set(0.0);
        self.m15_rate.set(0.0);
    }
}

#[inline]
fn decay(rate: &AtomicRate, alpha: f64, instant_rate: f64) {
    let old = rate.get();
    rate.set(old + alpha * (instant_rate - old));
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter")
            .field("count", &self.count())
            .field("m1_rate", &(self.m1_rate.get() * NANOS_PER_SECOND))
            .field("m5_rate", &(self.m5_rate.get() * NANOS_PER_SECOND))
            .field("m15_rate", &(self.m15_rate.get() * NANOS_PER_SECOND))
            .field("interval", &self.interval.duration)
            .finish()
    }
}
