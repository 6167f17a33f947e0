//! # Toolweave - Orchestration and caching core for tool execution
//!
//! Toolweave sits above individual tool implementations and provides:
//! - A chain engine that runs dependency-ordered graphs of tool, conditional,
//!   parallel, transform, loop and custom steps with retry and progress events
//! - An execution cache with canonical keys, TTL and sliding expiry,
//!   dependency and pattern invalidation and size-bounded eviction
//! - An output limiter that truncates or summarizes oversized tool results
//! - A reference tool runtime enforcing capabilities, timeouts and cancellation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use toolweave_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ToolweaveConfig::load()?;
//!
//!     let runtime = ToolRuntime::with_config(Arc::new(registry), config.runtime.clone());
//!     let cache = Arc::new(ExecutionCache::new(config.cache.clone()));
//!     let executor = Arc::new(CachedToolExecutor::new(runtime, cache.clone()));
//!
//!     let chain = ChainBuilder::new("scan")
//!         .step(Step::tool("list", "list_dir").param("path", "{{params.root}}"))
//!         .build()?;
//!
//!     let result = ChainEngine::with_config(executor, config.engine.clone())
//!         .run(&chain, params, ExecutionContext::new())
//!         .await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **tools**: executor contract, execution context, results and fault taxonomy
//! - **limiter**: bounded output per shape (text, file list, file content, logs, structured)
//! - **cache**: the shared execution cache and its caching executor decorator
//! - **workflow**: chain definition, validation and the chain engine
//! - **metrics**: fire-and-forget execution and cache event recording

pub mod cache;
pub mod config;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod telemetry;
pub mod tools;
pub mod workflow;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{
        CacheConfig, CacheKeyContext, CacheOptions, CachePriority, CacheStatistics,
        CachedToolExecutor, EvictionHandle, ExecutionCache, Expiration,
    };
    pub use crate::config::ToolweaveConfig;
    pub use crate::error::{Result, ToolweaveError};
    pub use crate::limiter::{
        FileListSummary, LimitedOutput, LimiterConfig, OutputLimitContext, OutputLimiter,
        OutputShape,
    };
    pub use crate::metrics::{
        CacheEvent, ExecutionRecord, InMemoryMetricsRecorder, MetricsRecorder,
        NoopMetricsRecorder,
    };
    pub use crate::telemetry::init_tracing;
    pub use crate::tools::{
        BoxedTool, Capability, CapabilityPolicy, CapabilitySet, ExecutionContext, FaultKind,
        ResourceLimits, Tool, ToolExecutor, ToolFault, ToolMetadata, ToolParameters,
        ToolRegistry, ToolResult, ToolRuntime, ToolRuntimeConfig,
    };
    pub use crate::workflow::{
        Chain, ChainBuilder, ChainContext, ChainEngine, ChainResult, EngineConfig,
        ErrorHandler, ProgressEvent, Step, StepHandler, StepResult, StepStatus,
        WorkflowError, progress_channel,
    };
}
