//! Tool result and fault taxonomy
//!
//! A [`ToolResult`] is created once by the executor and never mutated after it
//! leaves the executor pipeline. Failures are data: a failed invocation is a
//! `ToolResult` with `success == false`, an error message and, optionally, a
//! structured [`ToolFault`] that says whether retrying makes sense.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Metadata key set on results served from the execution cache
pub const META_CACHE_HIT: &str = "cache_hit";
/// Metadata key set when the output limiter replaced the payload
pub const META_TRUNCATED: &str = "truncated";
/// Metadata key carrying the payload size before limiting
pub const META_ORIGINAL_SIZE: &str = "original_size";
/// Metadata key naming the invocation a result was produced for
pub const META_CORRELATION_ID: &str = "correlation_id";

/// Outcome of one tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that produced this result
    pub tool_id: String,

    /// Whether the tool succeeded
    pub success: bool,

    /// Result payload (`Null` on failure)
    pub payload: Value,

    /// Human-readable error message on failure
    pub error: Option<String>,

    /// Structured fault on failure
    pub fault: Option<ToolFault>,

    /// Execution duration
    #[serde(with = "duration_millis")]
    pub duration: Duration,

    /// When the execution started
    pub started_at: DateTime<Utc>,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_id: impl Into<String>, payload: Value) -> Self {
        Self {
            tool_id: tool_id.into(),
            success: true,
            payload,
            error: None,
            fault: None,
            duration: Duration::ZERO,
            started_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Create a failed result with a plain message
    pub fn failure(tool_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            success: false,
            payload: Value::Null,
            error: Some(message.into()),
            fault: None,
            duration: Duration::ZERO,
            started_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Create a failed result from a structured fault
    pub fn from_fault(tool_id: impl Into<String>, fault: ToolFault) -> Self {
        let mut result = Self::failure(tool_id, fault.message.clone());
        result.fault = Some(fault);
        result
    }

    /// Create a cancelled result
    pub fn cancelled(tool_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::from_fault(tool_id, ToolFault::new(FaultKind::Cancelled, reason))
    }

    /// Set duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set start timestamp
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Check if this result represents cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(&self.fault, Some(f) if f.kind == FaultKind::Cancelled)
    }

    /// Check if a retry could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match &self.fault {
            Some(fault) => fault.kind.is_retryable(),
            None => !self.success,
        }
    }

    /// Whether this result was served from the execution cache
    pub fn is_cache_hit(&self) -> bool {
        self.metadata
            .get(META_CACHE_HIT)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Rough in-memory footprint used for cache budgeting
    pub fn estimated_size(&self) -> usize {
        let payload = serde_json::to_string(&self.payload)
            .map(|s| s.len())
            .unwrap_or(0);
        let metadata: usize = self
            .metadata
            .iter()
            .map(|(k, v)| k.len() + v.to_string().len())
            .sum();
        let error = self.error.as_ref().map(String::len).unwrap_or(0);

        payload + metadata + error + self.tool_id.len() + std::mem::size_of::<Self>()
    }
}

/// Structured fault attached to a failed result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFault {
    /// Fault kind (determines retryability)
    pub kind: FaultKind,

    /// Human-readable message
    pub message: String,

    /// Additional context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ToolFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Invalid arguments
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Validation, message)
    }

    /// Required capabilities were not granted
    pub fn capability_denied(denied: &[String]) -> Self {
        Self::new(
            FaultKind::CapabilityDenied,
            format!("Required capabilities denied: {}", denied.join(", ")),
        )
        .with_context(serde_json::json!(denied))
    }

    /// Execution exceeded its time limit
    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            FaultKind::Timeout,
            format!("Tool execution timed out after {:?}", limit),
        )
    }

    /// Transient failure
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Transient, message)
    }

    /// Bug or unexpected state inside the tool
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Internal, message)
    }
}

impl std::fmt::Display for ToolFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolFault {}

/// Fault kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Input validation failed (not retryable - fix args)
    Validation,

    /// Required capability was denied (not retryable - policy)
    CapabilityDenied,

    /// Execution timed out (retryable)
    Timeout,

    /// Rate limit exceeded (retryable after delay)
    RateLimited,

    /// Transient I/O or service error (retryable)
    Transient,

    /// Resource not found (not retryable)
    NotFound,

    /// Internal tool error (not retryable - bug)
    Internal,

    /// Cancelled by the caller (not retryable)
    Cancelled,
}

impl FaultKind {
    /// Check if this fault kind is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FaultKind::Timeout | FaultKind::RateLimited | FaultKind::Transient
        )
    }
}

// Serde helpers for Duration serialization as milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
