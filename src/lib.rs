//! A set-associative cache model for cycle-level simulators.
//!
//! [`Cache`] answers hit or miss and the latency of every access, can carry
//! block payloads, and keeps the access, miss and clustered-miss counters.
//! Two caches are chained into a hierarchy by [`trace::MemoryHierarchy`].
pub mod cache;
pub mod config;
pub mod error;
pub mod ffi;
pub mod sim;
pub mod statistics;
pub mod trace;
pub(self) mod test_utils;

pub use cache::{AccessKind, AccessResult, Cache, CacheSnapshot, FillResult};
pub use config::{CacheConfig, HierarchyConfig, ReplacementPolicy};
pub use error::{CacheError, CacheResult};
pub use statistics::{CacheReport, CacheStatistics};

use tracing_subscriber::EnvFilter;

/// install the global subscriber, filtered by `RUST_LOG` and `info` by default.
/// later calls are no-ops
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .unwrap_or_default();
}
