//! Workflow error types

use crate::error::ToolweaveError;
use thiserror::Error;

/// Error raised inside a single step
///
/// These never escape the engine: a step that returns one is recorded as a
/// failed [`StepResult`](super::StepResult).
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Step execution failed
    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    /// A transform function rejected its input
    #[error("Transform failed: {0}")]
    Transform(String),

    /// A custom or error-handler step failed
    #[error("Handler failed: {0}")]
    Handler(String),

    /// The run was cancelled
    #[error("Execution cancelled")]
    Cancelled,

    /// The tool executor reported a contract violation
    #[error(transparent)]
    Executor(#[from] ToolweaveError),
}

/// Result type for step-level operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// One structural problem found while building a chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildIssue {
    #[error("step id is empty")]
    EmptyStepId,

    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    MissingDependency { step: String, dependency: String },

    #[error("dependency cycle among steps [{}]", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Every issue that kept a chain from being built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain '{chain}' is invalid: {}", describe(.issues))]
pub struct ChainBuildError {
    pub chain: String,
    pub issues: Vec<BuildIssue>,
}

fn describe(issues: &[BuildIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_error_lists_every_issue() {
        let err = ChainBuildError {
            chain: "ingest".to_string(),
            issues: vec![
                BuildIssue::DuplicateStepId("fetch".into()),
                BuildIssue::MissingDependency {
                    step: "parse".into(),
                    dependency: "download".into(),
                },
                BuildIssue::Cycle(vec!["a".into(), "b".into()]),
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("chain 'ingest' is invalid"));
        assert!(message.contains("duplicate step id 'fetch'"));
        assert!(message.contains("unknown step 'download'"));
        assert!(message.contains("cycle among steps [a, b]"));
    }

    #[test]
    fn test_converts_into_crate_error() {
        let err: ToolweaveError = ChainBuildError {
            chain: "c".into(),
            issues: vec![BuildIssue::EmptyStepId],
        }
        .into();
        assert!(matches!(err, ToolweaveError::ChainBuild(_)));
    }
}
