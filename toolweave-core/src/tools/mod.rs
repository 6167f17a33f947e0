//! Tool execution layer
//!
//! This module defines the narrow contracts the orchestration core consumes:
//! - [`ToolExecutor`]: run one tool by id under an [`ExecutionContext`]
//! - [`ToolResult`]: the immutable outcome of one invocation
//!
//! It also ships [`ToolRuntime`], a reference executor that enforces
//! deny-by-default capability grants, timeouts and cancellation over a
//! [`ToolRegistry`] of [`Tool`] implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolweave_core::tools::{ExecutionContext, ToolRegistry, ToolRuntime, ToolExecutor};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Arc::new(ListDirTool::new()))?;
//!
//! let runtime = ToolRuntime::new(Arc::new(registry));
//! let result = runtime.execute("list_dir", &params, &ExecutionContext::new()).await?;
//! ```

mod capability;
mod context;
mod executor;
mod registry;
mod result;
mod runtime;
mod tool;

pub use capability::{Capability, CapabilityPolicy, CapabilitySet};
pub use context::{ExecutionContext, ResourceLimits};
pub use executor::{ToolExecutor, ToolParameters, parameters_from_json};
pub use registry::ToolRegistry;
pub use result::{
    FaultKind, META_CACHE_HIT, META_CORRELATION_ID, META_ORIGINAL_SIZE, META_TRUNCATED,
    ToolFault, ToolResult,
};
pub(crate) use result::duration_millis;
pub use runtime::{ToolRuntime, ToolRuntimeConfig};
pub use tool::{BoxedTool, Tool, ToolMetadata};
