//! Smart summaries for oversized file listings
//!
//! Instead of cutting a listing after N entries, the summary aggregates the
//! whole listing: counts, the most common extensions, and the largest parent
//! directories with a few sample entries each.

use super::types::LimiterConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::path::Path;

/// Extension frequency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionCount {
    pub extension: String,
    pub count: usize,
}

/// Entries sharing a parent directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGroup {
    pub directory: String,
    pub total: usize,
    pub samples: Vec<String>,
}

/// Aggregated view of a file listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListSummary {
    pub root: String,
    pub total_count: usize,
    /// Entries named in the summary's samples
    pub shown_count: usize,
    pub file_count: usize,
    pub directory_count: usize,
    pub unique_extension_count: usize,
    pub top_extensions: Vec<ExtensionCount>,
    pub groups: Vec<FileGroup>,
}

/// Pull entry paths out of a payload
///
/// Accepts an array of strings, an array of objects carrying a `path` or
/// `name` field, or a newline-separated string. Anything else is `None`.
pub(crate) fn extract_entries(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(text) => Some(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map
                    .get("path")
                    .or_else(|| map.get("name"))
                    .and_then(Value::as_str)
                    .map(|s| {
                        let is_dir = map.get("is_dir").and_then(Value::as_bool).unwrap_or(false);
                        if is_dir && !s.ends_with('/') {
                            format!("{s}/")
                        } else {
                            s.to_string()
                        }
                    }),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn is_directory(entry: &str) -> bool {
    entry.ends_with('/')
}

/// Split an entry into parent directory and display name
fn split_entry(entry: &str) -> (&str, &str) {
    let trimmed = entry.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => (".", trimmed),
    }
}

fn common_root(entries: &[String]) -> String {
    let mut parents = entries.iter().map(|e| split_entry(e).0);
    let Some(first) = parents.next() else {
        return ".".to_string();
    };

    let mut prefix: Vec<&str> = first.split('/').collect();
    for parent in parents {
        let shared = prefix
            .iter()
            .zip(parent.split('/'))
            .take_while(|(a, b)| *a == b)
            .count();
        prefix.truncate(shared);
        if prefix.is_empty() {
            break;
        }
    }

    let root = prefix.join("/");
    if root.is_empty() {
        if first.starts_with('/') { "/".to_string() } else { ".".to_string() }
    } else {
        root
    }
}

/// Build a summary over every entry
pub fn summarize_file_list(entries: &[String], config: &LimiterConfig) -> FileListSummary {
    let mut directory_count = 0;
    let mut extensions: HashMap<String, usize> = HashMap::new();
    let mut by_parent: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for entry in entries {
        let (parent, name) = split_entry(entry);
        by_parent.entry(parent).or_default().push(name);

        if is_directory(entry) {
            directory_count += 1;
        } else if let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) {
            *extensions.entry(ext.to_lowercase()).or_insert(0) += 1;
        }
    }

    let mut top_extensions: Vec<ExtensionCount> = extensions
        .iter()
        .map(|(extension, count)| ExtensionCount {
            extension: extension.clone(),
            count: *count,
        })
        .collect();
    top_extensions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.extension.cmp(&b.extension)));
    top_extensions.truncate(config.top_extensions);

    let mut groups: Vec<FileGroup> = by_parent
        .into_iter()
        .map(|(directory, names)| FileGroup {
            directory: directory.to_string(),
            total: names.len(),
            samples: names
                .iter()
                .take(config.samples_per_group)
                .map(|n| n.to_string())
                .collect(),
        })
        .collect();
    // BTreeMap order breaks ties by directory name
    groups.sort_by(|a, b| b.total.cmp(&a.total));
    groups.truncate(config.max_groups);

    let shown_count = groups.iter().map(|g| g.samples.len()).sum();

    FileListSummary {
        root: common_root(entries),
        total_count: entries.len(),
        shown_count,
        file_count: entries.len() - directory_count,
        directory_count,
        unique_extension_count: extensions.len(),
        top_extensions,
        groups,
    }
}

/// Actionable hints for narrowing a listing
pub fn suggestions_for(summary: &FileListSummary) -> Vec<String> {
    let mut suggestions = Vec::new();

    if let Some(top) = summary.top_extensions.first() {
        suggestions.push(format!(
            "Filter by pattern, e.g. '*.{}' ({} matching files)",
            top.extension, top.count
        ));
    }
    if let Some(group) = summary.groups.first() {
        suggestions.push(format!(
            "List a specific subdirectory, e.g. '{}' ({} entries)",
            group.directory, group.total
        ));
    }
    if summary.directory_count > 0 {
        suggestions.push("Limit recursion depth to see the top-level layout first".to_string());
    }

    suggestions
}

/// Render a summary as a multi-line report
pub fn format_file_list_summary(summary: &FileListSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "File listing: {}", summary.root);
    let _ = writeln!(
        out,
        "{} entries ({} files, {} directories, {} distinct extensions)",
        summary.total_count,
        summary.file_count,
        summary.directory_count,
        summary.unique_extension_count
    );

    if !summary.groups.is_empty() {
        out.push_str("\nLargest directories:\n");
        for group in &summary.groups {
            let _ = writeln!(out, "  {} ({} entries)", group.directory, group.total);
            for sample in &group.samples {
                let _ = writeln!(out, "    {sample}");
            }
            let hidden = group.total - group.samples.len();
            if hidden > 0 {
                let _ = writeln!(out, "    ... and {hidden} more");
            }
        }
    }

    if !summary.top_extensions.is_empty() {
        let histogram: Vec<String> = summary
            .top_extensions
            .iter()
            .map(|e| format!(".{} ({})", e.extension, e.count))
            .collect();
        let _ = writeln!(out, "\nExtensions: {}", histogram.join(", "));
    }

    let _ = write!(
        out,
        "\nShowing {} of {} entries",
        summary.shown_count, summary.total_count
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<String> {
        let mut entries = Vec::new();
        for i in 0..30 {
            entries.push(format!("project/src/file{i}.rs"));
        }
        for i in 0..8 {
            entries.push(format!("project/docs/page{i}.md"));
        }
        entries.push("project/src/nested/".to_string());
        entries
    }

    #[test]
    fn test_split_entry() {
        assert_eq!(split_entry("a/b/c.rs"), ("a/b", "c.rs"));
        assert_eq!(split_entry("a/b/"), ("a", "b"));
        assert_eq!(split_entry("c.rs"), (".", "c.rs"));
        assert_eq!(split_entry("/etc"), ("/", "etc"));
    }

    #[test]
    fn test_summary_counts() {
        let summary = summarize_file_list(&listing(), &LimiterConfig::default());

        assert_eq!(summary.root, "project");
        assert_eq!(summary.total_count, 39);
        assert_eq!(summary.directory_count, 1);
        assert_eq!(summary.file_count, 38);
        assert_eq!(summary.unique_extension_count, 2);
        assert_eq!(summary.top_extensions[0].extension, "rs");
        assert_eq!(summary.top_extensions[0].count, 30);
        assert_eq!(summary.groups[0].directory, "project/src");
        assert_eq!(summary.groups[0].total, 31);
        assert_eq!(summary.groups[0].samples.len(), 5);
        assert_eq!(summary.shown_count, 10);
    }

    #[test]
    fn test_extract_entries_from_objects() {
        let value = serde_json::json!([
            {"path": "src/lib.rs"},
            {"name": "target", "is_dir": true},
        ]);
        let entries = extract_entries(&value).unwrap();
        assert_eq!(entries, vec!["src/lib.rs".to_string(), "target/".to_string()]);

        assert!(extract_entries(&serde_json::json!([1, 2])).is_none());
        assert!(extract_entries(&serde_json::json!(42)).is_none());
    }

    #[test]
    fn test_format_report() {
        let summary = summarize_file_list(&listing(), &LimiterConfig::default());
        let report = format_file_list_summary(&summary);

        assert!(report.starts_with("File listing: project"));
        assert!(report.contains("project/src (31 entries)"));
        assert!(report.contains("... and 26 more"));
        assert!(report.contains(".rs (30)"));
        assert!(report.ends_with("Showing 10 of 39 entries"));
    }

    #[test]
    fn test_suggestions() {
        let summary = summarize_file_list(&listing(), &LimiterConfig::default());
        let suggestions = suggestions_for(&summary);
        assert!(suggestions.iter().any(|s| s.contains("*.rs")));
        assert!(suggestions.iter().any(|s| s.contains("project/src")));
    }
}
