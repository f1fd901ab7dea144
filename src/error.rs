use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeterError {
    #[error("Tick interval must be non-zero, got {0:?}")]
    InvalidInterval(Duration),
    #[error("Meter ticks every {meter:?} but the ticker runs every {ticker:?}")]
    IntervalMismatch { meter: Duration, ticker: Duration },
    #[error("Ticker is already running")]
    AlreadyRunning,
    #[error("Failed to spawn ticker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MeterError>;
