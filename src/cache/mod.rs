//! Durable evaluation cache.
//!
//! Epistemic foundation:
//! - K_i: Results at different search budgets are not comparable → the
//!   budget is part of the key
//! - B_i: The cache file may be missing or corrupt → cold cache, never fatal
//! - I^B: Disk failures during flush → logged, in-memory state kept

mod entry;
mod store;

pub use entry::{cache_key, CacheEntry};
pub use store::{CacheStats, EvaluationCache};
