//! Step and chain results

use crate::tools::{ToolFault, duration_millis};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::step::Step;

/// Final state of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Not started because a dependency did not succeed
    Skipped,
    Cancelled,
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub name: String,
    pub status: StepStatus,
    pub payload: Value,
    pub error: Option<String>,
    pub fault: Option<ToolFault>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// Executions including retries
    pub attempts: u32,
    /// Sub-step outcomes for conditional, parallel and loop steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StepResult>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl StepResult {
    fn new(step: &Step, status: StepStatus) -> Self {
        let now = Utc::now();
        Self {
            step_id: step.id.clone(),
            name: step.name.clone(),
            status,
            payload: Value::Null,
            error: None,
            fault: None,
            started_at: now,
            finished_at: now,
            duration: Duration::ZERO,
            attempts: 0,
            children: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn succeeded(step: &Step, payload: Value) -> Self {
        Self {
            payload,
            ..Self::new(step, StepStatus::Succeeded)
        }
    }

    pub fn failed(step: &Step, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(step, StepStatus::Failed)
        }
    }

    pub fn skipped(step: &Step, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::new(step, StepStatus::Skipped)
        }
    }

    pub fn cancelled(step: &Step, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::new(step, StepStatus::Cancelled)
        }
    }

    pub fn with_fault(mut self, fault: ToolFault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn with_children(mut self, children: Vec<StepResult>) -> Self {
        self.children = children;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub(crate) fn timed(mut self, started_at: DateTime<Utc>, duration: Duration) -> Self {
        self.started_at = started_at;
        self.duration = duration;
        self.finished_at = Utc::now();
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    /// Whether another attempt could change the outcome
    pub(crate) fn is_retryable(&self) -> bool {
        self.status == StepStatus::Failed
            && self.fault.as_ref().is_none_or(|f| f.kind.is_retryable())
    }
}

/// Outcome of one chain run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResult {
    pub chain_id: String,
    pub run_id: String,
    /// True when no step failed or was cancelled
    pub success: bool,
    pub cancelled: bool,
    /// Top-level step results in execution order
    pub steps: Vec<StepResult>,
    /// Shared state at the end of the run
    pub state: HashMap<String, Value>,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl ChainResult {
    /// Look up a step result by id, including nested sub-steps
    pub fn step(&self, id: &str) -> Option<&StepResult> {
        fn find<'a>(results: &'a [StepResult], id: &str) -> Option<&'a StepResult> {
            results.iter().find_map(|r| {
                if r.step_id == id {
                    Some(r)
                } else {
                    find(&r.children, id)
                }
            })
        }
        find(&self.steps, id)
    }

    fn ids_with(&self, status: StepStatus) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.step_id.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.ids_with(StepStatus::Succeeded)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.ids_with(StepStatus::Failed)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.ids_with(StepStatus::Skipped)
    }

    /// Payload of the last top-level step that succeeded
    pub fn final_output(&self) -> Option<&Value> {
        self.steps
            .iter()
            .rev()
            .find(|r| r.is_success())
            .map(|r| &r.payload)
    }

    pub fn output(&self, step_id: &str) -> Option<&Value> {
        self.step(step_id).map(|r| &r.payload)
    }
}
