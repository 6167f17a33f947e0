//! Per-call execution context
//!
//! An [`ExecutionContext`] is created by the caller for each invocation and
//! passed by reference through the cache, the chain engine and the executor.
//! Its cancellation token is the single signal every layer observes.

use super::capability::CapabilityPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Resource limits the executor enforces for one call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall-clock limit for a single tool execution
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Upper bound on characters returned in a tool payload
    #[serde(default)]
    pub max_output_chars: Option<usize>,
}

impl ResourceLimits {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_output_chars(mut self, max: usize) -> Self {
        self.max_output_chars = Some(max);
        self
    }
}

/// Ambient state for one invocation
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Permission grant checked against each tool's required capabilities
    pub permissions: CapabilityPolicy,

    /// Resource limits for tool executions made under this context
    pub limits: ResourceLimits,

    /// Correlation id shared by every record produced for this call
    pub correlation_id: String,

    /// Cancellation signal
    pub cancellation: CancellationToken,

    /// Free-form side channel
    pub extra: HashMap<String, Value>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            permissions: CapabilityPolicy::default(),
            limits: ResourceLimits::default(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
            cancellation: CancellationToken::new(),
            extra: HashMap::new(),
        }
    }
}

impl ExecutionContext {
    /// Create a new context with a fresh correlation id and deny-all permissions
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the permission grant
    pub fn with_permissions(mut self, permissions: CapabilityPolicy) -> Self {
        self.permissions = permissions;
        self
    }

    /// Set resource limits
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the correlation id
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// Use an existing cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Insert a side-channel value
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Request cancellation of every operation sharing this context's token
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_cancellation() {
        let ctx = ExecutionContext::new();
        let copy = ctx.clone();
        assert!(!copy.is_cancelled());

        ctx.cancel();
        assert!(copy.is_cancelled());
    }

    #[test]
    fn test_fresh_correlation_ids() {
        let a = ExecutionContext::new();
        let b = ExecutionContext::new();
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn test_builder() {
        let ctx = ExecutionContext::new()
            .with_correlation_id("req-42")
            .with_limits(ResourceLimits::default().with_timeout(Duration::from_secs(2)))
            .with_extra("user", serde_json::json!("u1"));

        assert_eq!(ctx.correlation_id, "req-42");
        assert_eq!(ctx.limits.timeout, Some(Duration::from_secs(2)));
        assert_eq!(ctx.extra["user"], "u1");
    }
}
