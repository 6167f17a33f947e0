//! The tool executor contract consumed by the cache and the chain engine

use super::context::ExecutionContext;
use super::result::ToolResult;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Named tool parameters
pub type ToolParameters = HashMap<String, Value>;

/// Runs one tool by identifier
///
/// Implementations enforce permissions and resource limits themselves. An
/// ordinary tool-level failure is returned as `Ok` with a failed
/// [`ToolResult`]; `Err` is reserved for contract violations such as an
/// unknown tool id.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        tool_id: &str,
        parameters: &ToolParameters,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult>;
}

#[async_trait]
impl<E: ToolExecutor + ?Sized> ToolExecutor for Arc<E> {
    async fn execute(
        &self,
        tool_id: &str,
        parameters: &ToolParameters,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult> {
        (**self).execute(tool_id, parameters, ctx).await
    }
}

/// Build a parameter map from a JSON object, ignoring non-object input
pub fn parameters_from_json(value: Value) -> ToolParameters {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => ToolParameters::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_from_json() {
        let params = parameters_from_json(serde_json::json!({"path": "/tmp", "depth": 2}));
        assert_eq!(params.len(), 2);
        assert_eq!(params["depth"], 2);
    }

    #[test]
    fn test_parameters_from_non_object() {
        assert!(parameters_from_json(serde_json::json!([1, 2])).is_empty());
    }
}
