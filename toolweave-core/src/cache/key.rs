//! Canonical cache keys
//!
//! A key has the form `tool:<id>:params:<name=value,...>` followed by optional
//! `:user:<id>`, `:env:<name>` and `:v:<version>` segments. Parameters are
//! sorted by name and nested objects are rendered with sorted keys, so the
//! order parameters were supplied in never affects the key. Values are
//! rendered as JSON and any name or segment containing a delimiter is quoted,
//! so distinct parameter maps never share a key. Keys longer than
//! the configured threshold keep their `tool:<id>` prefix and replace the rest
//! with a SHA-256 digest of the full canonical form.

use crate::tools::ToolParameters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Default key length threshold
pub const DEFAULT_MAX_KEY_LENGTH: usize = 250;

/// Extra dimensions that participate in key identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKeyContext {
    pub user_id: Option<String>,
    pub environment: Option<String>,
    pub version: Option<String>,
    /// Parameters left out of the key, e.g. request ids
    #[serde(default)]
    pub excluded_parameters: HashSet<String>,
}

impl CacheKeyContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn excluding(mut self, parameter: impl Into<String>) -> Self {
        self.excluded_parameters.insert(parameter.into());
        self
    }
}

/// Builds keys with a fixed length threshold
#[derive(Debug, Clone, Copy)]
pub struct KeyGenerator {
    max_key_length: usize,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEY_LENGTH)
    }
}

impl KeyGenerator {
    pub fn new(max_key_length: usize) -> Self {
        Self { max_key_length }
    }

    pub fn generate(
        &self,
        tool_id: &str,
        parameters: &ToolParameters,
        ctx: Option<&CacheKeyContext>,
    ) -> String {
        let mut names: Vec<&String> = parameters
            .keys()
            .filter(|name| ctx.is_none_or(|c| !c.excluded_parameters.contains(*name)))
            .collect();
        names.sort();

        let rendered: Vec<String> = names
            .into_iter()
            .map(|name| {
                format!("{}={}", render_segment(name), render_canonical(&parameters[name]))
            })
            .collect();

        let mut key = format!("tool:{tool_id}:params:{}", rendered.join(","));
        if let Some(ctx) = ctx {
            if let Some(user) = &ctx.user_id {
                key.push_str(&format!(":user:{}", render_segment(user)));
            }
            if let Some(env) = &ctx.environment {
                key.push_str(&format!(":env:{}", render_segment(env)));
            }
            if let Some(version) = &ctx.version {
                key.push_str(&format!(":v:{}", render_segment(version)));
            }
        }

        if key.len() <= self.max_key_length {
            return key;
        }

        let digest = Sha256::digest(key.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("tool:{tool_id}:hash:{hex}")
    }
}

/// Generate a key with the default length threshold
pub fn generate_key(
    tool_id: &str,
    parameters: &ToolParameters,
    ctx: Option<&CacheKeyContext>,
) -> String {
    KeyGenerator::default().generate(tool_id, parameters, ctx)
}

/// Tool id encoded in a key's `tool:<id>:` prefix
pub fn tool_id_from_key(key: &str) -> Option<&str> {
    let rest = key.strip_prefix("tool:")?;
    let end = [":params:", ":hash:"]
        .iter()
        .filter_map(|marker| rest.find(marker))
        .min()
        .or_else(|| rest.find(':'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Bare text unless it holds a delimiter, in which case it is JSON-quoted
fn render_segment(text: &str) -> String {
    if text.contains([',', '=', ':', '"']) {
        Value::String(text.to_string()).to_string()
    } else {
        text.to_string()
    }
}

/// JSON rendering with object keys sorted at every depth
fn render_canonical(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), render_canonical(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(render_canonical).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}
