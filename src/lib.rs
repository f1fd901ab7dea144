//! Lock-free event meter.
//!
//! A [`Meter`] counts events marked from any number of threads and keeps
//! exponentially-weighted 1, 5 and 15 minute rates. The rates advance once per
//! [`TickInterval`], driven by a [`Ticker`].
//!
//! ```
//! use metrics_meter::Meter;
//! use std::time::Duration;
//!
//! let meter = Meter::new();
//! meter.mark(60);
//! meter.tick();
//!
//! let value = meter.value(Duration::from_secs(5));
//! assert_eq!(value.count, 60);
//! assert!((value.one_minute_rate - 12.0).abs() < 1e-9);
//! ```

mod error;
mod metrics;
mod registry;
mod ticker;

/// Export error types
pub use error::{MeterError, Result};
/// Export metric primitives
pub use crate::metrics::*;
/// Export registry trait
pub use registry::Registry;
/// Export the tick scheduler
pub use ticker::{MeterId, Ticker, TickerConfig};
