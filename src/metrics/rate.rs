use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A floating-point cell with atomic load and store.
///
/// The value is kept as its IEEE-754 bit pattern inside an [`AtomicU64`], so a
/// reader racing a writer observes either the previous or the new value, never
/// a partially written one.
pub struct AtomicRate(AtomicU64);

impl AtomicRate {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

impl Default for AtomicRate {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl fmt::Debug for AtomicRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicRate").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_zero() {
        assert_eq!(AtomicRate::default().get(), 0.0);
    }

    #[test]
    fn preserves_exact_bits() {
        let r = AtomicRate::new(0.0);
        let v = 60.0 / 5e9;
        r.set(v);
        assert_eq!(r.get().to_bits(), v.to_bits());
    }
}
