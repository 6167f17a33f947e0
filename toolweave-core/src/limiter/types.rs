//! Output shapes, limiter thresholds and limiting results

use super::file_list::FileListSummary;
use crate::error::{Result, ToolweaveError};
use serde::{Deserialize, Serialize};

/// How a tool's payload is laid out, which selects the limiting strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    /// Free-form text
    #[default]
    Text,
    /// One path per entry, directories marked with a trailing `/`
    FileList,
    /// The contents of a single file
    FileContent,
    /// Line-oriented log output
    Logs,
    /// Arbitrary JSON
    Structured,
}

impl OutputShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputShape::Text => "text",
            OutputShape::FileList => "file_list",
            OutputShape::FileContent => "file_content",
            OutputShape::Logs => "logs",
            OutputShape::Structured => "structured",
        }
    }
}

impl std::fmt::Display for OutputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-shape thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Character cap for plain text
    pub max_text_chars: usize,

    /// Entry count above which a file list is summarized
    pub max_file_list_entries: usize,

    /// Line cap for file content
    pub max_file_content_lines: usize,

    /// Lines kept from the start of a log
    pub log_head_lines: usize,

    /// Lines kept from the end of a log
    pub log_tail_lines: usize,

    /// Character cap for serialized structured data
    pub max_structured_chars: usize,

    /// Sample entries shown per directory group
    pub samples_per_group: usize,

    /// Directory groups shown in a file-list summary
    pub max_groups: usize,

    /// Extensions listed in a file-list summary
    pub top_extensions: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 10_000,
            max_file_list_entries: 100,
            max_file_content_lines: 500,
            log_head_lines: 50,
            log_tail_lines: 50,
            max_structured_chars: 20_000,
            samples_per_group: 5,
            max_groups: 10,
            top_extensions: 5,
        }
    }
}

impl LimiterConfig {
    /// Reject thresholds that would discard everything
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("max_text_chars", self.max_text_chars),
            ("max_file_list_entries", self.max_file_list_entries),
            ("max_file_content_lines", self.max_file_content_lines),
            ("log_head_lines", self.log_head_lines),
            ("log_tail_lines", self.log_tail_lines),
            ("max_structured_chars", self.max_structured_chars),
            ("samples_per_group", self.samples_per_group),
            ("max_groups", self.max_groups),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ToolweaveError::Configuration(format!(
                    "limiter.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// Per-call overrides of the configured limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLimitContext {
    /// Overrides the character budget of the selected strategy
    pub max_chars: Option<usize>,
    pub include_summary: bool,
    pub include_suggestions: bool,
}

impl Default for OutputLimitContext {
    fn default() -> Self {
        Self {
            max_chars: None,
            include_summary: true,
            include_suggestions: true,
        }
    }
}

impl OutputLimitContext {
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }

    pub fn without_summary(mut self) -> Self {
        self.include_summary = false;
        self
    }

    pub fn without_suggestions(mut self) -> Self {
        self.include_suggestions = false;
        self
    }
}

/// Outcome of limiting one payload
///
/// Sizes are character counts. When `truncated` is false `content` is the
/// payload as rendered, untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitedOutput {
    pub content: String,
    pub truncated: bool,
    pub original_size: usize,
    pub truncated_size: usize,
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<FileListSummary>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl LimitedOutput {
    /// Pass-through result
    pub fn unmodified(content: String) -> Self {
        let size = content.chars().count();
        Self {
            content,
            truncated: false,
            original_size: size,
            truncated_size: size,
            reason: None,
            summary: None,
            suggestions: Vec::new(),
        }
    }

    pub(crate) fn truncated(
        content: String,
        original_size: usize,
        reason: impl Into<String>,
    ) -> Self {
        let truncated_size = content.chars().count();
        Self {
            content,
            truncated: true,
            original_size,
            truncated_size,
            reason: Some(reason.into()),
            summary: None,
            suggestions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_serde_names() {
        let json = serde_json::to_string(&OutputShape::FileList).unwrap();
        assert_eq!(json, "\"file_list\"");
        let shape: OutputShape = serde_json::from_str("\"logs\"").unwrap();
        assert_eq!(shape, OutputShape::Logs);
    }

    #[test]
    fn test_config_validation() {
        assert!(LimiterConfig::default().validate().is_ok());

        let config = LimiterConfig {
            log_tail_lines: 0,
            ..LimiterConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_tail_lines"));
    }

    #[test]
    fn test_context_defaults_include_everything() {
        let ctx = OutputLimitContext::default();
        assert!(ctx.include_summary);
        assert!(ctx.include_suggestions);
        assert!(ctx.max_chars.is_none());
    }
}
