//! Write-optimized counter spreading additions over independent stripes.
//!
//! Every producer thread is handed a slot the first time it touches any
//! [`StripedAdder`]; slots are assigned round robin from a process-wide
//! counter and stay fixed for the thread's lifetime. A thread always adds into
//! stripe `slot % stripes`, so concurrent producers mostly hit distinct cache
//! lines. Reads have to sum every stripe, which is fine since they happen once
//! per tick or on demand.

use crossbeam_utils::CachePadded;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_SLOT: usize = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
}

#[inline]
fn thread_slot() -> usize {
    THREAD_SLOT.with(|slot| *slot)
}

fn default_stripes() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .next_power_of_two()
}

pub struct StripedAdder {
    stripes: Box<[CachePadded<AtomicI64>]>,
}

impl StripedAdder {
    /// One stripe per available core, rounded up to a power of two
    pub fn new() -> Self {
        Self::with_stripes(default_stripes())
    }

    /// Creates an adder with exactly `stripes` cells (at least one)
    pub fn with_stripes(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1))
            .map(|_| CachePadded::new(AtomicI64::new(0)))
            .collect();
        Self { stripes }
    }

    #[inline]
    pub fn stripes(&self) -> usize {
        self.stripes.len()
    }

    /// Adds `delta` to the calling thread's stripe
    #[inline]
    pub fn add(&self, delta: i64) {
        let idx = thread_slot() % self.stripes.len();
        self.stripes[idx].fetch_add(delta, Ordering::Release);
    }

    /// Sum of all stripes at the time each one is visited
    pub fn get(&self) -> i64 {
        self.stripes
            .iter()
            .map(|stripe| stripe.load(Ordering::Acquire))
            .sum()
    }

    /// Swaps every stripe with zero and returns the sum of the swapped values.
    ///
    /// An `add` racing with this call is folded into either this result or the
    /// next one, it is never dropped.
    pub fn get_and_reset(&self) -> i64 {
        self.stripes
            .iter()
            .map(|stripe| stripe.swap(0, Ordering::AcqRel))
            .sum()
    }

    pub fn reset(&self) {
        for stripe in self.stripes.iter() {
            stripe.store(0, Ordering::Release);
        }
    }
}

impl Default for StripedAdder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StripedAdder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripedAdder")
            .field("stripes", &self.stripes())
            .field("value", &self.get())
            .finish()
    }
}
