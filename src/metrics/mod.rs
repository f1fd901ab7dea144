mod adder;
mod counter;
mod meter;
mod rate;
mod unit;

pub use adder::StripedAdder;
pub use counter::AtomicCounter;
pub use meter::{Meter, MeterValue, TickInterval};
pub use rate::AtomicRate;
pub use unit::TimeUnit;
