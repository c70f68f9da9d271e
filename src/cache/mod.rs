pub mod eviction;
pub mod storage;

pub use eviction::{MAX_ENTRY_AGE, SWEEP_INTERVAL, start_eviction};
pub use storage::{ReferenceCache, sanitize_name};
