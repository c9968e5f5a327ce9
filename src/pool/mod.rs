//! Pool module - bounded concurrency for reply probes.

mod probe;

pub use probe::*;
