#![forbid(unsafe_code)]

//! Memoization for per-guild lookups.
//!
//! A wrapped function gets an LRU table keyed by the function name plus the
//! canonical text of its arguments. Entries stay until evicted or explicitly
//! invalidated; there is no expiry.

mod key;
mod memoized;
mod stats;
mod table;

pub use key::{CacheKey, KeyArgs, KeyBuilder, KeyPart, Opaque};
pub use memoized::{AsyncMemoized, Memoized};
pub use stats::CacheStatsSnapshot;
pub use table::MemoCache;

/// Default number of entries per wrapped function.
pub const DEFAULT_CAPACITY: usize = 64;
