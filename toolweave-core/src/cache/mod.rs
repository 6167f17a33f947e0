//! Execution cache
//!
//! Memoizes tool results behind canonical keys so repeated invocations with
//! the same tool, parameters and key context are served without running the
//! tool again.
//!
//! - [`ExecutionCache`]: the shared store (TTL and sliding expiry, transitive
//!   dependency invalidation, glob invalidation, size-bounded eviction)
//! - [`CachedToolExecutor`]: a [`ToolExecutor`](crate::tools::ToolExecutor)
//!   decorator that consults the store first
//! - [`EvictionHandle`]: the background sweep started by
//!   [`ExecutionCache::spawn_eviction`]
//!
//! Cache failures are never surfaced to callers; they degrade to misses.
//!
//! # Example
//!
//! ```rust,ignore
//! let cache = Arc::new(ExecutionCache::new(CacheConfig::default()));
//! let eviction = cache.spawn_eviction();
//!
//! let executor = CachedToolExecutor::new(runtime, cache.clone());
//! let result = executor.execute("list_dir", &params, &ctx).await?;
//!
//! cache.invalidate_by_tool("list_dir");
//! eviction.shutdown().await;
//! ```

mod cached_executor;
mod config;
mod entry;
mod eviction;
mod key;
mod store;

pub use cached_executor::CachedToolExecutor;
pub use config::CacheConfig;
pub use entry::{CacheEntry, CacheOptions, CachePriority, Expiration};
pub use eviction::EvictionHandle;
pub use key::{
    CacheKeyContext, DEFAULT_MAX_KEY_LENGTH, KeyGenerator, generate_key, tool_id_from_key,
};
pub use store::{CacheStatistics, ExecutionCache};
