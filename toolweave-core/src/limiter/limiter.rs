//! Shape-aware output limiting

use super::file_list::{extract_entries, format_file_list_summary, suggestions_for, summarize_file_list};
use super::types::{LimitedOutput, LimiterConfig, OutputLimitContext, OutputShape};
use serde_json::Value;

/// Bounds oversized tool payloads
///
/// Limiting never fails: a payload a strategy cannot interpret comes back
/// rendered but otherwise unmodified, with `truncated` cleared.
#[derive(Debug, Clone, Default)]
pub struct OutputLimiter {
    config: LimiterConfig,
}

impl OutputLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Whether `content` exceeds the threshold for `shape`
    pub fn needs_limiting(&self, content: &Value, shape: OutputShape) -> bool {
        match shape {
            OutputShape::Text => char_len(&render(content)) > self.config.max_text_chars,
            OutputShape::FileList => extract_entries(content)
                .is_some_and(|entries| entries.len() > self.config.max_file_list_entries),
            OutputShape::FileContent => {
                render(content).lines().count() > self.config.max_file_content_lines
            }
            OutputShape::Logs => {
                render(content).lines().count()
                    > self.config.log_head_lines + self.config.log_tail_lines
            }
            OutputShape::Structured => {
                char_len(&content.to_string()) > self.config.max_structured_chars
            }
        }
    }

    /// Produce a bounded rendering of `content`
    pub fn limit_output(
        &self,
        content: &Value,
        shape: OutputShape,
        ctx: Option<&OutputLimitContext>,
    ) -> LimitedOutput {
        let default_ctx = OutputLimitContext::default();
        let ctx = ctx.unwrap_or(&default_ctx);

        let limited = match shape {
            OutputShape::Text => Some(self.limit_text(content, ctx)),
            OutputShape::FileList => self.limit_file_list(content, ctx),
            OutputShape::FileContent => Some(self.limit_file_content(content, ctx)),
            OutputShape::Logs => Some(self.limit_logs(content, ctx)),
            OutputShape::Structured => Some(self.limit_structured(content, ctx)),
        };

        limited.unwrap_or_else(|| {
            tracing::debug!(shape = %shape, "payload not limitable for shape, passing through");
            LimitedOutput::unmodified(render(content))
        })
    }

    fn limit_text(&self, content: &Value, ctx: &OutputLimitContext) -> LimitedOutput {
        let max = ctx.max_chars.unwrap_or(self.config.max_text_chars);
        cut_text(render(content), max, "text")
    }

    fn limit_file_list(&self, content: &Value, ctx: &OutputLimitContext) -> Option<LimitedOutput> {
        let entries = extract_entries(content)?;
        let max = self.config.max_file_list_entries;
        if entries.len() <= max {
            return Some(self.apply_char_override(LimitedOutput::unmodified(render(content)), ctx));
        }

        let original_size = char_len(&entries.join("\n"));
        let summary = summarize_file_list(&entries, &self.config);
        let reason = format!("file list of {} entries exceeds {max}", entries.len());

        let content = if ctx.include_summary {
            format_file_list_summary(&summary)
        } else {
            let footer = format!("[... {} more entries]", entries.len() - max);
            let mut shown: Vec<&str> = entries.iter().take(max).map(String::as_str).collect();
            shown.push(footer.as_str());
            shown.join("\n")
        };

        let mut limited = LimitedOutput::truncated(content, original_size, reason);
        if ctx.include_suggestions {
            limited.suggestions = suggestions_for(&summary);
        }
        if ctx.include_summary {
            limited.summary = Some(summary);
        }
        Some(self.apply_char_override(limited, ctx))
    }

    fn limit_file_content(&self, content: &Value, ctx: &OutputLimitContext) -> LimitedOutput {
        let text = render(content);
        let max_lines = self.config.max_file_content_lines;
        let total = text.lines().count();

        let limited = if total > max_lines {
            let marker = format!("[... {} more lines omitted]", total - max_lines);
            let mut kept: Vec<&str> = text.lines().take(max_lines).collect();
            kept.push(marker.as_str());
            let mut limited = LimitedOutput::truncated(
                kept.join("\n"),
                char_len(&text),
                format!("file has {total} lines, showing the first {max_lines}"),
            );
            if ctx.include_suggestions {
                limited.suggestions = vec![format!(
                    "Read a specific line range starting after line {max_lines}"
                )];
            }
            limited
        } else {
            LimitedOutput::unmodified(text)
        };

        self.apply_char_override(limited, ctx)
    }

    fn limit_logs(&self, content: &Value, ctx: &OutputLimitContext) -> LimitedOutput {
        let text = render(content);
        let lines: Vec<&str> = text.lines().collect();
        let head = self.config.log_head_lines;
        let tail = self.config.log_tail_lines;

        let limited = if lines.len() > head + tail {
            let omitted = lines.len() - head - tail;
            let marker = format!("[... {omitted} lines omitted ...]");
            let mut kept: Vec<&str> = Vec::with_capacity(head + tail + 1);
            kept.extend_from_slice(&lines[..head]);
            kept.push(marker.as_str());
            kept.extend_from_slice(&lines[lines.len() - tail..]);

            let mut limited = LimitedOutput::truncated(
                kept.join("\n"),
                char_len(&text),
                format!("log has {} lines, keeping first {head} and last {tail}", lines.len()),
            );
            if ctx.include_suggestions {
                limited.suggestions = vec!["Filter the log for errors or a time range".to_string()];
            }
            limited
        } else {
            LimitedOutput::unmodified(text)
        };

        self.apply_char_override(limited, ctx)
    }

    fn limit_structured(&self, content: &Value, ctx: &OutputLimitContext) -> LimitedOutput {
        let max = ctx.max_chars.unwrap_or(self.config.max_structured_chars);
        let mut limited = cut_text(content.to_string(), max, "structured output");
        if limited.truncated {
            limited.reason = Some(format!(
                "structured output of {} characters exceeds {max}; the result is not valid JSON",
                limited.original_size
            ));
        }
        limited
    }

    /// Apply a caller-supplied character budget on top of a line strategy
    fn apply_char_override(&self, limited: LimitedOutput, ctx: &OutputLimitContext) -> LimitedOutput {
        let Some(max) = ctx.max_chars else {
            return limited;
        };
        if limited.truncated_size <= max {
            return limited;
        }

        let original_size = limited.original_size;
        let mut cut = cut_text(limited.content, max, "output");
        cut.original_size = original_size;
        cut.suggestions = limited.suggestions;
        cut.summary = limited.summary;
        cut
    }
}

/// Render a payload as text; strings are taken verbatim
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Cut `text` at `max` characters on a char boundary and append a marker
fn cut_text(text: String, max: usize, what: &str) -> LimitedOutput {
    let total = char_len(&text);
    if total <= max {
        return LimitedOutput::unmodified(text);
    }

    let end = text.char_indices().nth(max).map_or(text.len(), |(idx, _)| idx);
    let mut content = text[..end].to_string();
    content.push_str(&format!(
        "\n[... truncated: showing {max} of {total} characters]"
    ));
    LimitedOutput::truncated(content, total, format!("{what} of {total} characters exceeds {max}"))
}
