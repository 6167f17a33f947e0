//! Tool runtime with policy enforcement
//!
//! The runtime is the reference [`ToolExecutor`]: it resolves a tool id in a
//! registry and wraps the call with:
//! - Cancellation checks
//! - Capability policy enforcement
//! - Parameter validation
//! - Timeouts raced against cancellation
//! - Output limiting by the tool's declared output shape
//! - Execution records for the metrics recorder

use super::context::ExecutionContext;
use super::executor::{ToolExecutor, ToolParameters};
use super::registry::ToolRegistry;
use super::result::{
    FaultKind, META_CORRELATION_ID, META_ORIGINAL_SIZE, META_TRUNCATED, ToolFault, ToolResult,
};
use super::tool::Tool;
use crate::error::{Result, ToolweaveError};
use crate::limiter::{OutputLimitContext, OutputLimiter};
use crate::metrics::{ExecutionRecord, MetricsRecorder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolRuntimeConfig {
    /// Default timeout for tool execution
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Per-tool timeout overrides
    #[serde(with = "crate::config::duration_map")]
    pub tool_timeouts: HashMap<String, Duration>,
}

impl Default for ToolRuntimeConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            tool_timeouts: HashMap::new(),
        }
    }
}

impl ToolRuntimeConfig {
    /// Create a config with a specific timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Add a tool-specific timeout
    pub fn with_tool_timeout(mut self, tool_id: impl Into<String>, timeout: Duration) -> Self {
        self.tool_timeouts.insert(tool_id.into(), timeout);
        self
    }
}

/// Policy-enforcing executor over a [`ToolRegistry`]
pub struct ToolRuntime {
    registry: Arc<ToolRegistry>,
    config: ToolRuntimeConfig,
    limiter: Option<Arc<OutputLimiter>>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
}

impl ToolRuntime {
    /// Create a runtime with default configuration
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::with_config(registry, ToolRuntimeConfig::default())
    }

    /// Create a runtime with custom configuration
    pub fn with_config(registry: Arc<ToolRegistry>, config: ToolRuntimeConfig) -> Self {
        Self {
            registry,
            config,
            limiter: None,
            metrics: None,
        }
    }

    /// Bound oversized payloads with this limiter
    pub fn with_limiter(mut self, limiter: Arc<OutputLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Report execution records to this recorder
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ToolRuntimeConfig {
        &self.config
    }

    fn timeout_for(&self, tool_id: &str, ctx: &ExecutionContext) -> Duration {
        ctx.limits
            .timeout
            .or_else(|| self.config.tool_timeouts.get(tool_id).copied())
            .unwrap_or(self.config.default_timeout)
    }

    async fn run_guarded(
        &self,
        tool: &dyn Tool,
        parameters: &ToolParameters,
        ctx: &ExecutionContext,
    ) -> std::result::Result<Value, ToolFault> {
        if ctx.is_cancelled() {
            return Err(ToolFault::new(
                FaultKind::Cancelled,
                "Cancelled before execution",
            ));
        }

        let required = tool.required_capabilities();
        if let Err(denied) = ctx.permissions.check_all(&required) {
            let mut names: Vec<String> = denied.iter().map(|c| c.to_string()).collect();
            names.sort();
            return Err(ToolFault::capability_denied(&names));
        }

        tool.validate(parameters)?;

        let limit = self.timeout_for(tool.id(), ctx);
        tokio::select! {
            _ = ctx.cancellation.cancelled() => {
                Err(ToolFault::new(FaultKind::Cancelled, "Execution cancelled"))
            }
            res = timeout(limit, tool.run(parameters, ctx)) => {
                match res {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ToolFault::timeout(limit)),
                }
            }
        }
    }

    fn apply_limits(&self, tool: &dyn Tool, ctx: &ExecutionContext, result: ToolResult) -> ToolResult {
        let Some(limiter) = &self.limiter else {
            return result;
        };

        let limit_ctx = OutputLimitContext {
            max_chars: ctx.limits.max_output_chars,
            ..OutputLimitContext::default()
        };
        let limited =
            limiter.limit_output(&result.payload, tool.metadata().output_shape, Some(&limit_ctx));
        if !limited.truncated {
            return result;
        }

        tracing::debug!(
            tool = %result.tool_id,
            original = limited.original_size,
            kept = limited.truncated_size,
            "limited tool output"
        );

        let original_size = limited.original_size;
        let mut result = ToolResult {
            payload: Value::String(limited.content),
            ..result
        }
        .with_metadata(META_TRUNCATED, Value::Bool(true))
        .with_metadata(META_ORIGINAL_SIZE, Value::from(original_size));

        if let Some(reason) = limited.reason {
            result = result.with_metadata("limit_reason", Value::String(reason));
        }
        if !limited.suggestions.is_empty() {
            result = result.with_metadata("suggestions", serde_json::json!(limited.suggestions));
        }
        result
    }
}

#[async_trait]
impl ToolExecutor for ToolRuntime {
    async fn execute(
        &self,
        tool_id: &str,
        parameters: &ToolParameters,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult> {
        let tool = self
            .registry
            .get(tool_id)
            .ok_or_else(|| ToolweaveError::UnknownTool(tool_id.to_string()))?;

        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let outcome = self.run_guarded(tool.as_ref(), parameters, ctx).await;
        let duration = start.elapsed();

        let result = match outcome {
            Ok(payload) => {
                let result = ToolResult::success(tool_id, payload);
                self.apply_limits(tool.as_ref(), ctx, result)
            }
            Err(fault) => {
                tracing::debug!(tool = %tool_id, kind = ?fault.kind, "tool failed: {}", fault.message);
                ToolResult::from_fault(tool_id, fault)
            }
        }
        .with_duration(duration)
        .with_started_at(started_at)
        .with_metadata(META_CORRELATION_ID, Value::String(ctx.correlation_id.clone()));

        if let Some(metrics) = &self.metrics {
            metrics.record_execution(
                ExecutionRecord::new(tool_id, duration, result.success)
                    .with_correlation_id(&ctx.correlation_id),
            );
        }

        Ok(result)
    }
}
