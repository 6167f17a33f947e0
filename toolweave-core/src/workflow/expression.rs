//! `{{...}}` parameter expressions
//!
//! Three namespaces are understood:
//! - `steps.<id>[.path]`: payload of a completed step
//! - `params.<name>[.path]`: an initial chain parameter
//! - `state.<name>[.path]`: current shared state
//!
//! Path segments walk object fields and array indices. An expression that
//! cannot be resolved yields "no value" rather than an error: `null` when the
//! whole string is one expression, an empty string when it is embedded in
//! surrounding text.

use super::context::ChainContext;
use crate::tools::ToolParameters;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid template pattern"));

/// A parsed reference into the run context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Step { id: String, path: Vec<String> },
    Param { name: String, path: Vec<String> },
    State { name: String, path: Vec<String> },
}

impl Expression {
    /// Parse the inside of a `{{...}}` template
    pub fn parse(source: &str) -> Option<Self> {
        let source = source.trim();
        let (namespace, rest) = source.split_once('.')?;
        let mut segments = rest.split('.').map(str::trim);
        let root = segments.next().filter(|s| !s.is_empty())?.to_string();
        let path: Vec<String> = segments.map(str::to_string).collect();
        if path.iter().any(String::is_empty) {
            return None;
        }

        match namespace.trim() {
            "steps" => Some(Expression::Step { id: root, path }),
            "params" => Some(Expression::Param { name: root, path }),
            "state" => Some(Expression::State { name: root, path }),
            _ => None,
        }
    }

    pub fn resolve(&self, ctx: &ChainContext) -> Option<Value> {
        let (root, path) = match self {
            Expression::Step { id, path } => (ctx.step_output(id)?, path),
            Expression::Param { name, path } => (ctx.param(name)?, path),
            Expression::State { name, path } => (ctx.get_state(name)?, path),
        };
        walk(root, path).cloned()
    }
}

fn walk<'a>(mut value: &'a Value, path: &[String]) -> Option<&'a Value> {
    for segment in path {
        value = match value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

fn resolve_source(source: &str, ctx: &ChainContext) -> Option<Value> {
    Expression::parse(source)?.resolve(ctx)
}

/// Resolve every template inside `value`, recursing into arrays and objects
pub fn resolve_value(value: &Value, ctx: &ChainContext) -> Value {
    match value {
        Value::String(text) => resolve_string(text, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, ctx)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_string(text: &str, ctx: &ChainContext) -> Value {
    if !text.contains("{{") {
        return Value::String(text.to_string());
    }

    // A lone template keeps the resolved value's JSON type
    if let Some(caps) = TEMPLATE.captures(text) {
        if caps.get(0).is_some_and(|m| m.start() == 0 && m.end() == text.len()) {
            return resolve_source(&caps[1], ctx).unwrap_or(Value::Null);
        }
    }

    let spliced = TEMPLATE.replace_all(text, |caps: &Captures| {
        match resolve_source(&caps[1], ctx) {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    });
    Value::String(spliced.into_owned())
}

/// Resolve templates in every parameter value
pub fn resolve_parameters(parameters: &ToolParameters, ctx: &ChainContext) -> ToolParameters {
    parameters
        .iter()
        .map(|(name, value)| (name.clone(), resolve_value(value, ctx)))
        .collect()
}
