//! Per-run chain state

use super::progress::ProgressEmitter;
use super::result::StepResult;
use crate::tools::ExecutionContext;
use serde_json::Value;
use std::collections::HashMap;

/// Mutable state scoped to one chain run
///
/// Holds every completed step result, the free-form shared state, the initial
/// parameters and the payload of the most recent successful step. Parallel
/// sub-steps each receive a snapshot; writes they make are not merged back.
#[derive(Debug, Clone)]
pub struct ChainContext {
    chain_id: String,
    run_id: String,
    step_results: HashMap<String, StepResult>,
    state: HashMap<String, Value>,
    params: HashMap<String, Value>,
    previous: Option<Value>,
    exec: ExecutionContext,
    progress: ProgressEmitter,
}

impl ChainContext {
    pub(crate) fn new(
        chain_id: &str,
        params: HashMap<String, Value>,
        exec: ExecutionContext,
        progress: ProgressEmitter,
        run_id: String,
    ) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            run_id,
            step_results: HashMap::new(),
            state: HashMap::new(),
            params,
            previous: None,
            exec,
            progress,
        }
    }

    /// Standalone context, mainly for exercising predicates and transforms
    pub fn detached(params: HashMap<String, Value>) -> Self {
        Self::new(
            "detached",
            params,
            ExecutionContext::new(),
            ProgressEmitter::new(None, "detached", ""),
            uuid::Uuid::new_v4().to_string(),
        )
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The execution context passed to every tool invocation
    pub fn execution(&self) -> &ExecutionContext {
        &self.exec
    }

    pub fn is_cancelled(&self) -> bool {
        self.exec.is_cancelled()
    }

    pub fn step_result(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.get(step_id)
    }

    /// Payload of a completed step
    pub fn step_output(&self, step_id: &str) -> Option<&Value> {
        self.step_results.get(step_id).map(|r| &r.payload)
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn params(&self) -> &HashMap<String, Value> {
        &self.params
    }

    pub fn get_state(&self, name: &str) -> Option<&Value> {
        self.state.get(name)
    }

    pub fn set_state(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.state.insert(name.into(), value)
    }

    pub fn remove_state(&mut self, name: &str) -> Option<Value> {
        self.state.remove(name)
    }

    pub fn state(&self) -> &HashMap<String, Value> {
        &self.state
    }

    /// Payload of the most recent successful step
    pub fn previous(&self) -> Option<&Value> {
        self.previous.as_ref()
    }

    /// Make a step's result visible to later steps
    pub(crate) fn record(&mut self, result: &StepResult) {
        if result.is_success() {
            self.previous = Some(result.payload.clone());
        }
        self.step_results.insert(result.step_id.clone(), result.clone());
    }

    /// Make a sub-step's result addressable without moving `previous`
    pub(crate) fn record_nested(&mut self, result: &StepResult) {
        self.step_results.insert(result.step_id.clone(), result.clone());
    }

    /// Put `name` back to `saved`, removing it when it did not exist
    pub(crate) fn restore_state(&mut self, name: &str, saved: Option<Value>) {
        match saved {
            Some(value) => {
                self.state.insert(name.to_string(), value);
            }
            None => {
                self.state.remove(name);
            }
        }
    }

    pub(crate) fn emit_progress(&self, step_id: Option<&str>, message: impl Into<String>, percentage: u8) {
        self.progress.emit(step_id, message, percentage);
    }

    pub(crate) fn into_state(self) -> HashMap<String, Value> {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Step;
    use serde_json::json;

    #[test]
    fn test_record_tracks_previous_success() {
        let mut ctx = ChainContext::detached(HashMap::new());
        let step = Step::transform("a", |_, _| Ok(Value::Null)).build();

        ctx.record(&StepResult::succeeded(&step, json!(1)));
        ctx.record(&StepResult::failed(&step, "boom"));

        assert_eq!(ctx.previous(), Some(&json!(1)));
        assert!(!ctx.step_result("a").unwrap().is_success());
    }

    #[test]
    fn test_restore_state() {
        let mut ctx = ChainContext::detached(HashMap::new());
        ctx.set_state("item", json!("outer"));

        ctx.set_state("item", json!("inner"));
        ctx.restore_state("item", Some(json!("outer")));
        assert_eq!(ctx.get_state("item"), Some(&json!("outer")));

        ctx.set_state("tmp", json!(1));
        ctx.restore_state("tmp", None);
        assert!(ctx.get_state("tmp").is_none());
    }
}
