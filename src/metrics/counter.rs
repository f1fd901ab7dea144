use std::sync::atomic::{AtomicI64, Ordering};

/// Atomic 64-bit running total, the equivalent of an atomic `long`
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicI64);

impl AtomicCounter {
    pub const fn new(value: i64) -> Self {
        Self(AtomicI64::new(value))
    }

    /// Increases the value of the [`AtomicCounter`] by `delta`
    #[inline]
    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Release);
    }

    /// Read the current state of the [`AtomicCounter`]
    #[inline]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Overwrite the current state of the [`AtomicCounter`]
    #[inline]
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Release);
    }

    /// Read the current state and zero it in a single step
    #[inline]
    pub fn get_and_reset(&self) -> i64 {
        self.0.swap(0, Ordering::AcqRel)
    }
}
