//! Tool trait and metadata definitions
//!
//! Concrete tools (file, text, web, system operations) live outside this crate;
//! they plug in by implementing [`Tool`] and registering with a
//! [`ToolRegistry`](super::ToolRegistry).

use super::capability::CapabilitySet;
use super::context::ExecutionContext;
use super::executor::ToolParameters;
use super::result::ToolFault;
use crate::limiter::OutputShape;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Tool metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool id (unique within a registry)
    pub id: String,

    /// Human-readable description
    pub description: String,

    /// Shape of the payload this tool returns, used to pick a limiting strategy
    pub output_shape: OutputShape,

    /// Whether results may be memoized by the execution cache
    pub cacheable: bool,

    /// Tags for categorization
    pub tags: Vec<String>,
}

impl ToolMetadata {
    /// Create new metadata with required fields
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            output_shape: OutputShape::Text,
            cacheable: true,
            tags: Vec::new(),
        }
    }

    /// Set output shape
    pub fn with_output_shape(mut self, shape: OutputShape) -> Self {
        self.output_shape = shape;
        self
    }

    /// Mark results as not memoizable (side-effecting tools)
    pub fn uncacheable(mut self) -> Self {
        self.cacheable = false;
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Core tool trait
///
/// The runtime checks required capabilities and applies timeouts before and
/// around `run`; implementations only do the work.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get tool metadata
    fn metadata(&self) -> &ToolMetadata;

    /// Get tool id (convenience method)
    fn id(&self) -> &str {
        &self.metadata().id
    }

    /// Capabilities the caller must have been granted
    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::new()
    }

    /// Validate parameters before execution
    fn validate(&self, _parameters: &ToolParameters) -> Result<(), ToolFault> {
        Ok(())
    }

    /// Execute the tool
    async fn run(&self, parameters: &ToolParameters, ctx: &ExecutionContext)
    -> Result<Value, ToolFault>;
}

/// Type alias for shared tools
pub type BoxedTool = Arc<dyn Tool>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let metadata = ToolMetadata::new("list_dir", "Lists a directory")
            .with_output_shape(OutputShape::FileList)
            .with_tag("fs");

        assert_eq!(metadata.id, "list_dir");
        assert_eq!(metadata.output_shape, OutputShape::FileList);
        assert!(metadata.cacheable);
        assert!(!metadata.clone().uncacheable().cacheable);
    }
}
