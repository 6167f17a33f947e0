//! Error types for Toolweave operations

use crate::workflow::ChainBuildError;

/// Result type for Toolweave operations
pub type Result<T> = std::result::Result<T, ToolweaveError>;

/// Error types for the Toolweave core
///
/// Ordinary tool failures are never reported through this type; they travel as
/// data inside a [`ToolResult`](crate::tools::ToolResult). These variants cover
/// contract violations and setup problems only.
#[derive(Debug, thiserror::Error)]
pub enum ToolweaveError {
    /// The executor was asked to run a tool it does not know
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A tool with this id is already registered
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Chain definition is malformed
    #[error(transparent)]
    ChainBuild(#[from] ChainBuildError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ToolweaveError {
    fn from(s: String) -> Self {
        ToolweaveError::Other(s)
    }
}

impl From<&str> for ToolweaveError {
    fn from(s: &str) -> Self {
        ToolweaveError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ToolweaveError {
    fn from(err: anyhow::Error) -> Self {
        ToolweaveError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_message() {
        let err = ToolweaveError::UnknownTool("list_files".to_string());
        assert_eq!(err.to_string(), "Unknown tool: list_files");
    }

    #[test]
    fn test_from_anyhow() {
        let err: ToolweaveError = anyhow::anyhow!("wrapped failure").into();
        assert!(matches!(err, ToolweaveError::Other(ref m) if m == "wrapped failure"));
    }
}
