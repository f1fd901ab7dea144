use metrics_meter::{Meter, MeterError, Registry, TickInterval, Ticker, TickerConfig};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> TickerConfig {
    let interval = TickInterval::new(Duration::from_millis(10)).unwrap();
    TickerConfig::default()
        .with_interval(interval)
        .with_thread_name("fast-ticker")
}

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn manual_tick_cycle() {
    let ticker = Ticker::new(TickerConfig::default());
    let a = Arc::new(Meter::new());
    let b = Arc::new(Meter::new());
    ticker.register(&a).unwrap();
    ticker.register(&b).unwrap();

    a.mark(60);
    b.mark(5);
    assert_eq!(ticker.tick_all(), 2);

    let elapsed = Duration::from_secs(5);
    assert!((a.value(elapsed).one_minute_rate - 12.0).abs() < 1e-9);
    assert!((b.value(elapsed).one_minute_rate - 1.0).abs() < 1e-9);
    assert!(!ticker.is_running());
}

#[test]
fn rejects_mismatched_interval() {
    let ticker = Ticker::new(fast_config());
    let meter = Arc::new(Meter::new());
    match ticker.register(&meter) {
        Err(MeterError::IntervalMismatch { meter, ticker }) => {
            assert_eq!(meter, Duration::from_secs(5));
            assert_eq!(ticker, Duration::from_millis(10));
        }
        other => panic!("expected an interval mismatch, got {:?}", other),
    }
    assert!(ticker.is_empty());
}

#[test]
fn unregister_removes_meter() {
    let ticker = Ticker::new(TickerConfig::default());
    let meter = Arc::new(Meter::new());
    let id = ticker.register(&meter).unwrap();
    assert_eq!(ticker.len(), 1);
    assert!(ticker.find_meter(id).is_some());

    assert!(ticker.unregister(id));
    assert!(!ticker.unregister(id));
    assert!(ticker.find_meter(id).is_none());

    meter.mark(3);
    assert_eq!(ticker.tick_all(), 0);
    assert_eq!(meter.value(Duration::from_secs(1)).one_minute_rate, 0.0);
}

#[test]
fn dropped_meters_are_pruned() {
    let ticker = Ticker::new(TickerConfig::default());
    let kept = Arc::new(Meter::new());
    let dropped = Arc::new(Meter::new());
    let kept_id = ticker.register(&kept).unwrap();
    let dropped_id = ticker.register(&dropped).unwrap();

    drop(dropped);
    assert_eq!(ticker.len(), 1);
    assert_eq!(ticker.meter_ids(), vec![kept_id]);
    assert!(ticker.find_meter(dropped_id).is_none());
    assert_eq!(ticker.tick_all(), 1);
    assert!(!ticker.unregister(dropped_id));
}

#[test]
fn background_thread_ticks_meters() {
    let ticker = Ticker::start(fast_config()).unwrap();
    let meter = Arc::new(Meter::with_interval(*ticker.interval()));
    ticker.register(&meter).unwrap();
    meter.mark(10);

    let ticked = wait_for(Duration::from_secs(5), || {
        meter.value(Duration::from_secs(1)).one_minute_rate > 0.0
    });
    assert!(ticked, "meter was never ticked");
    assert_eq!(meter.count(), 10);
    ticker.stop();
}

#[test]
fn run_twice_fails() {
    let ticker = Ticker::start(fast_config()).unwrap();
    assert!(matches!(ticker.run(), Err(MeterError::AlreadyRunning)));
    assert!(ticker.is_running());
}

#[test]
fn stop_is_idempotent_and_restartable() {
    let ticker = Ticker::start(fast_config()).unwrap();
    ticker.stop();
    ticker.stop();
    assert!(!ticker.is_running());

    ticker.run().unwrap();
    assert!(ticker.is_running());
    ticker.stop();
}

#[test]
fn stopped_ticker_freezes_rates() {
    let ticker = Ticker::start(fast_config()).unwrap();
    let meter = Arc::new(Meter::with_interval(*ticker.interval()));
    ticker.register(&meter).unwrap();
    ticker.stop();

    meter.mark(25);
    thread::sleep(Duration::from_millis(50));

    let v = meter.value(Duration::from_secs(1));
    assert_eq!(v.count, 25);
    assert_eq!(v.one_minute_rate, 0.0);
}

#[test]
fn global_ticker_is_shared() {
    let a = Ticker::global().unwrap();
    let b = Ticker::global().unwrap();
    assert!(std::ptr::eq(a, b));
    assert!(a.is_running());
    assert_eq!(a.interval(), &TickInterval::default());

    let meter = Arc::new(Meter::new());
    let id = a.register(&meter).unwrap();
    assert!(a.unregister(id));
}
