//! Process-wide scheduler advancing every registered [`Meter`].
//!
//! A [`Ticker`] owns a single background thread that wakes up once per
//! [`TickInterval`] and calls [`Meter::tick`] on each live registration. It only
//! keeps [`Weak`] references: dropping the last [`Arc`] of a meter is enough
//! to retire it, the entry is pruned on the next cycle.

use crate::error::{MeterError, Result};
use crate::{Meter, Registry, TickInterval};
use log::{debug, trace, warn};
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const DEFAULT_THREAD_NAME: &str = "meter-ticker";

static GLOBAL: OnceCell<Ticker> = OnceCell::new();

/// Handle of a meter registered with a [`Ticker`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeterId(u64);

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "meter-{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct TickerConfig {
    interval: TickInterval,
    thread_name: String,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            interval: TickInterval::default(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl TickerConfig {
    pub fn with_interval(mut self, interval: TickInterval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn interval(&self) -> &TickInterval {
        &self.interval
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}

struct Shared {
    interval: TickInterval,
    meters: Mutex<HashMap<MeterId, Weak<Meter>>>,
    next_id: AtomicU64,
    // Serializes tick cycles between the background thread and manual callers
    cycle: Mutex<()>,
    shutdown: Mutex<bool>,
    wakeup: Condvar,
}

impl Shared {
    fn tick_all(&self) -> usize {
        let _cycle = self.cycle.lock();
        let live: Vec<Arc<Meter>> = {
            let mut meters = self.meters.lock();
            meters.retain(|id, meter| {
                let alive = meter.strong_count() > 0;
                if !alive {
                    trace!("Pruning dropped meter {}", id);
                }
                alive
            });
            meters.values().filter_map(Weak::upgrade).collect()
        };

        for meter in &live {
            meter.tick();
        }
        trace!("Ticked {} meters", live.len());
        live.len()
    }

    fn run(&self) {
        let period = self.interval.duration();
        let mut deadline = Instant::now() + period;
        let mut shutdown = self.shutdown.lock();

        loop {
            while !*shutdown && Instant::now() < deadline {
                self.wakeup.wait_until(&mut shutdown, deadline);
            }
            if *shutdown {
                break;
            }

            MutexGuard::unlocked(&mut shutdown, || {
                self.tick_all();
            });
            deadline = next_deadline(deadline, period, Instant::now());
        }
    }
}

/// Advances `deadline` by one period, skipping every period that already passed
fn next_deadline(deadline: Instant, period: Duration, now: Instant) -> Instant {
    let next = deadline + period;
    if now < next {
        return next;
    }
    let missed = (now - next).as_nanos() / period.as_nanos() + 1;
    warn!(
        "Meter ticker is {:?} behind schedule, skipping {} ticks",
        now - deadline,
        missed
    );
    u32::try_from(missed)
        .ok()
        .and_then(|missed| period.checked_mul(missed))
        .and_then(|skipped| next.checked_add(skipped))
        .unwrap_or(now + period)
}

/// Calls [`Meter::tick`] on every registered meter once per interval.
///
/// ```no_run
/// use metrics_meter::{Meter, Ticker, TickerConfig};
/// use std::sync::Arc;
///
/// let ticker = Ticker::start(TickerConfig::default()).unwrap();
/// let requests = Arc::new(Meter::new());
/// ticker.register(&requests).unwrap();
///
/// requests.mark(1);
/// ```
pub struct Ticker {
    shared: Arc<Shared>,
    thread_name: String,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Ticker {
    /// Creates a ticker without starting its thread
    pub fn new(config: TickerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                interval: config.interval,
                meters: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                cycle: Mutex::new(()),
                shutdown: Mutex::new(false),
                wakeup: Condvar::new(),
            }),
            thread_name: config.thread_name,
            handle: Mutex::new(None),
        }
    }

    pub fn start(config: TickerConfig) -> Result<Self> {
        let ticker = Self::new(config);
        ticker.run()?;
        Ok(ticker)
    }

    /// The process-wide ticker, started with the default config on first use
    pub fn global() -> Result<&'static Ticker> {
        GLOBAL.get_or_try_init(|| Ticker::start(TickerConfig::default()))
    }

    pub fn interval(&self) -> &TickInterval {
        &self.shared.interval
    }

    /// Spawns the background thread
    pub fn run(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Err(MeterError::AlreadyRunning);
        }

        *self.shared.shutdown.lock() = false;
        let shared = Arc::clone(&self.shared);
        let join = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || shared.run())?;
        *handle = Some(join);

        debug!(
            "Started meter ticker {} every {:?}",
            self.thread_name,
            self.shared.interval.duration()
        );
        Ok(())
    }

    /// Stops and joins the background thread. Rates stop updating afterwards.
    pub fn stop(&self) {
        let mut handle = self.handle.lock();
        if let Some(join) = handle.take() {
            *self.shared.shutdown.lock() = true;
            self.shared.wakeup.notify_all();
            if join.join().is_err() {
                warn!("Meter ticker {} panicked", self.thread_name);
            }
            debug!("Stopped meter ticker {}", self.thread_name);
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Registers a meter without taking ownership of it
    pub fn register(&self, meter: &Arc<Meter>) -> Result<MeterId> {
        if meter.interval() != &self.shared.interval {
            return Err(MeterError::IntervalMismatch {
                meter: meter.interval().duration(),
                ticker: self.shared.interval.duration(),
            });
        }

        let id = MeterId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared.meters.lock().insert(id, Arc::downgrade(meter));
        debug!("Registered {} with meter ticker {}", id, self.thread_name);
        Ok(id)
    }

    /// Returns `false` when `id` was unknown
    pub fn unregister(&self, id: MeterId) -> bool {
        let removed = self.shared.meters.lock().remove(&id).is_some();
        if removed {
            debug!("Unregistered {} from meter ticker {}", id, self.thread_name);
        }
        removed
    }

    /// Number of registered meters that are still alive
    pub fn len(&self) -> usize {
        self.shared
            .meters
            .lock()
            .values()
            .filter(|meter| meter.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs one tick cycle on the calling thread, returning the number of
    /// meters ticked
    pub fn tick_all(&self) -> usize {
        self.shared.tick_all()
    }
}

impl Registry for Ticker {
    fn find_meter(&self, id: MeterId) -> Option<Arc<Meter>> {
        self.shared.meters.lock().get(&id).and_then(Weak::upgrade)
    }

    fn meter_ids(&self) -> Vec<MeterId> {
        let mut ids: Vec<MeterId> = self
            .shared
            .meters
            .lock()
            .iter()
            .filter(|(_, meter)| meter.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticker")
            .field("thread_name", &self.thread_name)
            .field("interval", &self.shared.interval.duration())
            .field("meters", &self.len())
            .field("running", &self.is_running())
            .finish()
    }
}
