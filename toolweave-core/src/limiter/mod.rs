//! Output limiting
//!
//! Tool payloads are bounded per [`OutputShape`] before they are returned,
//! cached or stored in chain state:
//! - Text and structured data are cut at a character budget
//! - File lists are replaced by a [`FileListSummary`]
//! - File content keeps its first lines
//! - Logs keep a head and a tail around an omission marker
//!
//! # Example
//!
//! ```rust
//! use toolweave_core::limiter::{LimiterConfig, OutputLimiter, OutputShape};
//!
//! let limiter = OutputLimiter::new(LimiterConfig::default());
//! let limited = limiter.limit_output(&serde_json::json!("short"), OutputShape::Text, None);
//! assert!(!limited.truncated);
//! ```

pub mod file_list;
#[allow(clippy::module_inception)]
mod limiter;
mod types;

pub use file_list::{
    ExtensionCount, FileGroup, FileListSummary, format_file_list_summary, suggestions_for,
    summarize_file_list,
};
pub use limiter::OutputLimiter;
pub use types::{LimitedOutput, LimiterConfig, OutputLimitContext, OutputShape};
