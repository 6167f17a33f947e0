//! Tool registry: registration with duplicate detection and lookup by id

use super::tool::{BoxedTool, ToolMetadata};
use crate::error::{Result, ToolweaveError};
use std::collections::HashMap;

/// Registry of tools the runtime can execute
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, BoxedTool>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, rejecting duplicate ids
    pub fn register(&mut self, tool: BoxedTool) -> Result<()> {
        let id = tool.id().to_string();
        if self.tools.contains_key(&id) {
            return Err(ToolweaveError::DuplicateTool(id));
        }
        tracing::debug!(tool = %id, "registered tool");
        self.tools.insert(id, tool);
        Ok(())
    }

    /// Register a tool, replacing any existing tool with the same id
    pub fn register_or_replace(&mut self, tool: BoxedTool) -> Option<BoxedTool> {
        self.tools.insert(tool.id().to_string(), tool)
    }

    /// Remove a tool by id
    pub fn unregister(&mut self, id: &str) -> Option<BoxedTool> {
        self.tools.remove(id)
    }

    /// Look up a tool by id
    pub fn get(&self, id: &str) -> Option<&BoxedTool> {
        self.tools.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    /// Registered tool ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tools.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Metadata of every registered tool, sorted by id
    pub fn list(&self) -> Vec<ToolMetadata> {
        let mut list: Vec<ToolMetadata> =
            self.tools.values().map(|t| t.metadata().clone()).collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.ids())
            .finish()
    }
}
