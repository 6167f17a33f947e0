//! Chain execution engine
//!
//! The engine walks a [`Chain`] in its validated order, one top-level step at a
//! time. Only a parallel step fans out, spawning each sub-step as its own task
//! and joining on all of them. Every step execution, nested or not, is wrapped
//! in the retry loop; failures are recorded as [`StepResult`]s and never
//! escape [`ChainEngine::run`].

use super::chain::Chain;
use super::context::ChainContext;
use super::error::WorkflowError;
use super::expression::resolve_parameters;
use super::progress::{ProgressEmitter, ProgressReceiver, ProgressSender, percent};
use super::result::{ChainResult, StepResult, StepStatus};
use super::step::{Step, StepKind};
use crate::error::{Result, ToolweaveError};
use crate::limiter::{OutputLimiter, OutputShape};
use crate::tools::{
    ExecutionContext, FaultKind, META_ORIGINAL_SIZE, META_TRUNCATED, ToolExecutor, ToolFault,
    ToolParameters, ToolResult,
};
use chrono::Utc;
use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Engine-wide execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Retries for steps that do not set their own limit
    pub default_max_retries: u32,

    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Multiplier applied to the delay after each retry
    pub retry_backoff: f64,

    /// Upper bound on any single retry delay
    #[serde(with = "humantime_serde")]
    pub max_retry_delay: Duration,

    /// Buffer size for channels created by [`ChainEngine::progress_channel`]
    pub progress_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 0,
            retry_delay: Duration::ZERO,
            retry_backoff: 2.0,
            max_retry_delay: Duration::from_secs(30),
            progress_buffer: 64,
        }
    }
}

impl EngineConfig {
    pub fn with_default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_retry_backoff(mut self, multiplier: f64) -> Self {
        self.retry_backoff = multiplier.max(1.0);
        self
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.retry_delay.as_millis() as f64 * self.retry_backoff.powi(attempt as i32);
        let clamped = base.min(self.max_retry_delay.as_millis() as f64);
        Duration::from_millis(clamped as u64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_backoff.is_nan() || self.retry_backoff < 1.0 {
            return Err(ToolweaveError::Configuration(
                "engine.retry_backoff must be at least 1.0".into(),
            ));
        }
        if self.progress_buffer == 0 {
            return Err(ToolweaveError::Configuration(
                "engine.progress_buffer must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Whether a top-level step may start
enum Gate {
    Run(Vec<StepResult>),
    Skip(String),
}

/// Runs chains against a tool executor
#[derive(Clone)]
pub struct ChainEngine {
    executor: Arc<dyn ToolExecutor>,
    limiter: Option<Arc<OutputLimiter>>,
    config: EngineConfig,
}

impl std::fmt::Debug for ChainEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEngine")
            .field("has_limiter", &self.limiter.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl ChainEngine {
    /// Create an engine over `executor`, typically a cached executor
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self::with_config(executor, EngineConfig::default())
    }

    pub fn with_config(executor: Arc<dyn ToolExecutor>, config: EngineConfig) -> Self {
        Self {
            executor,
            limiter: None,
            config,
        }
    }

    /// Limit payloads of tool steps that declare an output shape
    pub fn with_limiter(mut self, limiter: Arc<OutputLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a progress channel sized from the engine configuration
    pub fn progress_channel(&self) -> (ProgressSender, ProgressReceiver) {
        super::progress::progress_channel(self.config.progress_buffer)
    }

    /// Run `chain` to completion
    pub async fn run(
        &self,
        chain: &Chain,
        params: HashMap<String, Value>,
        exec: ExecutionContext,
    ) -> ChainResult {
        self.run_inner(chain, params, exec, None).await
    }

    /// Run `chain`, publishing progress events to `progress`
    ///
    /// Events are sent without waiting; a slow subscriber loses events rather
    /// than stalling the chain.
    pub async fn run_with_progress(
        &self,
        chain: &Chain,
        params: HashMap<String, Value>,
        exec: ExecutionContext,
        progress: ProgressSender,
    ) -> ChainResult {
        self.run_inner(chain, params, exec, Some(progress)).await
    }

    async fn run_inner(
        &self,
        chain: &Chain,
        params: HashMap<String, Value>,
        exec: ExecutionContext,
        progress: Option<ProgressSender>,
    ) -> ChainResult {
        let run_id = uuid::Uuid::new_v4().to_string();
        let emitter = ProgressEmitter::new(progress, chain.id(), &run_id);
        let mut ctx = ChainContext::new(chain.id(), params, exec, emitter, run_id.clone());
        let started_at = Utc::now();
        let start = Instant::now();

        tracing::info!(chain = %chain.id(), run = %run_id, steps = chain.len(), "chain started");
        ctx.emit_progress(None, format!("Starting chain '{}'", chain.name()), 0);

        let total = chain.len();
        let mut results = Vec::with_capacity(total);
        for (position, step) in chain.steps().iter().enumerate() {
            let result = if ctx.is_cancelled() {
                StepResult::cancelled(step, "chain cancelled")
            } else {
                match gate(step, &ctx) {
                    Gate::Skip(reason) => {
                        tracing::debug!(step = %step.id, "skipping step: {}", reason);
                        StepResult::skipped(step, reason)
                    }
                    Gate::Run(failures) => {
                        ctx.emit_progress(
                            Some(&step.id),
                            format!("Running step '{}'", step.name),
                            percent(position, total),
                        );
                        self.run_with_retry(step, &mut ctx, &failures).await
                    }
                }
            };

            match result.status {
                StepStatus::Failed => tracing::warn!(
                    step = %step.id,
                    attempts = result.attempts,
                    "step failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                ),
                _ => tracing::debug!(step = %step.id, status = ?result.status, "step finished"),
            }
            ctx.emit_progress(
                Some(&step.id),
                format!("Step '{}' {}", step.name, status_label(result.status)),
                percent(position + 1, total),
            );
            ctx.record(&result);
            results.push(result);
        }

        let cancelled = ctx.is_cancelled()
            || results.iter().any(|r| r.status == StepStatus::Cancelled);
        let success = !cancelled && unrecovered_failures(&results) == 0;
        let duration = start.elapsed();

        ctx.emit_progress(None, "Chain finished", 100);
        tracing::info!(
            chain = %chain.id(),
            run = %run_id,
            success,
            cancelled,
            duration_ms = duration.as_millis() as u64,
            "chain finished"
        );

        ChainResult {
            chain_id: chain.id().to_string(),
            run_id,
            success,
            cancelled,
            steps: results,
            state: ctx.into_state(),
            started_at,
            duration,
        }
    }

    /// Execute a step, re-attempting retryable failures
    async fn run_with_retry(
        &self,
        step: &Arc<Step>,
        ctx: &mut ChainContext,
        failures: &[StepResult],
    ) -> StepResult {
        let max_retries = if step.retry.retryable {
            step.retry.max_retries.unwrap_or(self.config.default_max_retries)
        } else {
            0
        };
        let started_at = Utc::now();
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            let mut result = self.execute_step(step, ctx, failures).await;
            attempts += 1;

            if attempts > max_retries || !result.is_retryable() || ctx.is_cancelled() {
                result.attempts = attempts;
                return result.timed(started_at, start.elapsed());
            }

            let delay = self.config.delay_for_attempt(attempts - 1);
            tracing::warn!(
                step = %step.id,
                attempt = attempts,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                "retrying step: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );

            if !delay.is_zero() {
                tokio::select! {
                    _ = ctx.execution().cancellation.cancelled() => {
                        result.attempts = attempts;
                        return result.timed(started_at, start.elapsed());
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    /// Single dispatch point for every step kind
    fn execute_step<'a>(
        &'a self,
        step: &'a Arc<Step>,
        ctx: &'a mut ChainContext,
        failures: &'a [StepResult],
    ) -> BoxFuture<'a, StepResult> {
        Box::pin(async move {
            if ctx.is_cancelled() {
                return StepResult::cancelled(step, "chain cancelled");
            }

            match &step.kind {
                StepKind::Tool {
                    tool_id,
                    parameters,
                    output_shape,
                } => self.run_tool(step, tool_id, parameters, *output_shape, ctx).await,
                StepKind::Conditional {
                    condition,
                    then_step,
                    else_step,
                } => {
                    let branch = if condition(&*ctx) {
                        Some(("then", then_step))
                    } else {
                        else_step.as_ref().map(|s| ("else", s))
                    };
                    self.run_conditional(step, branch, ctx).await
                }
                StepKind::Parallel { steps } => self.run_parallel(step, steps, ctx).await,
                StepKind::Transform { transform } => match transform(ctx.previous(), &*ctx) {
                    Ok(value) => StepResult::succeeded(step, value),
                    Err(e) => handler_failure(step, e),
                },
                StepKind::Loop {
                    items,
                    body,
                    iterator_var,
                } => {
                    let items = items(&*ctx);
                    self.run_loop(step, items, body, iterator_var, ctx).await
                }
                StepKind::Custom { handler } => match handler.handle(ctx).await {
                    Ok(value) => StepResult::succeeded(step, value),
                    Err(e) => handler_failure(step, e),
                },
                StepKind::ErrorHandler { handler } => {
                    let recovered: Vec<Value> =
                        failures.iter().map(|f| json!(f.step_id)).collect();
                    match handler.recover(failures, ctx).await {
                        Ok(value) => StepResult::succeeded(step, value)
                            .with_metadata("recovered_from", Value::Array(recovered)),
                        Err(e) => handler_failure(step, e),
                    }
                }
            }
        })
    }

    async fn run_tool(
        &self,
        step: &Step,
        tool_id: &str,
        parameters: &ToolParameters,
        shape: Option<OutputShape>,
        ctx: &ChainContext,
    ) -> StepResult {
        let resolved = resolve_parameters(parameters, ctx);
        tracing::debug!(step = %step.id, tool = %tool_id, "invoking tool");

        let outcome = match self.executor.execute(tool_id, &resolved, ctx.execution()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let fault = match &e {
                    ToolweaveError::UnknownTool(_) => ToolFault::new(FaultKind::NotFound, e.to_string()),
                    _ => ToolFault::internal(e.to_string()),
                };
                return StepResult::failed(step, e.to_string())
                    .with_fault(fault)
                    .with_metadata("tool_id", json!(tool_id));
            }
        };

        self.step_from_tool(step, outcome, shape)
            .with_metadata("tool_id", json!(tool_id))
    }

    fn step_from_tool(&self, step: &Step, outcome: ToolResult, shape: Option<OutputShape>) -> StepResult {
        let ToolResult {
            success,
            payload,
            error,
            fault,
            metadata,
            ..
        } = outcome;
        let cancelled = matches!(&fault, Some(f) if f.kind == FaultKind::Cancelled);

        let mut result = if success {
            let mut payload = payload;
            let mut extra = Vec::new();
            if let (Some(limiter), Some(shape)) = (&self.limiter, shape) {
                let limited = limiter.limit_output(&payload, shape, None);
                if limited.truncated {
                    extra.push((META_TRUNCATED, Value::Bool(true)));
                    extra.push((META_ORIGINAL_SIZE, Value::from(limited.original_size)));
                    payload = Value::String(limited.content);
                }
            }
            let mut result = StepResult::succeeded(step, payload);
            for (key, value) in extra {
                result.metadata.insert(key.to_string(), value);
            }
            result
        } else if cancelled {
            StepResult::cancelled(step, error.unwrap_or_else(|| "tool cancelled".to_string()))
        } else {
            let result = StepResult::failed(step, error.unwrap_or_else(|| "tool failed".to_string()));
            match fault {
                Some(fault) => result.with_fault(fault),
                None => result,
            }
        };

        for (key, value) in metadata {
            result.metadata.entry(key).or_insert(value);
        }
        result
    }

    async fn run_conditional(
        &self,
        step: &Step,
        branch: Option<(&'static str, &Arc<Step>)>,
        ctx: &mut ChainContext,
    ) -> StepResult {
        let Some((label, branch_step)) = branch else {
            return StepResult::succeeded(step, Value::Null).with_metadata("branch", json!("none"));
        };

        tracing::debug!(step = %step.id, branch = label, "condition evaluated");
        let child = self.run_with_retry(branch_step, ctx, &[]).await;
        ctx.record_nested(&child);

        let result = match child.status {
            StepStatus::Succeeded => StepResult::succeeded(step, child.payload.clone()),
            StepStatus::Cancelled => StepResult::cancelled(step, "branch cancelled"),
            _ => StepResult::failed(
                step,
                format!(
                    "{} branch '{}' failed: {}",
                    label,
                    child.step_id,
                    child.error.as_deref().unwrap_or("unknown error")
                ),
            ),
        };
        result
            .with_metadata("branch", json!(label))
            .with_children(vec![child])
    }

    async fn run_parallel(&self, step: &Step, steps: &[Arc<Step>], ctx: &mut ChainContext) -> StepResult {
        let handles: Vec<_> = steps
            .iter()
            .map(|child| {
                let engine = self.clone();
                let child = Arc::clone(child);
                let mut child_ctx = ctx.clone();
                tokio::spawn(async move { engine.run_with_retry(&child, &mut child_ctx, &[]).await })
            })
            .collect();

        let children: Vec<StepResult> = join_all(handles)
            .await
            .into_iter()
            .zip(steps)
            .map(|(joined, child)| match joined {
                Ok(result) => result,
                Err(e) => StepResult::failed(child, format!("sub-step aborted: {e}"))
                    .with_fault(ToolFault::internal(e.to_string())),
            })
            .collect();

        for child in &children {
            ctx.record_nested(child);
        }

        let total = children.len();
        let failed = children.iter().filter(|c| !c.is_success()).count();
        let result = if ctx.is_cancelled() && children.iter().any(|c| c.status == StepStatus::Cancelled) {
            StepResult::cancelled(step, format!("{failed} of {total} cancelled or failed"))
        } else if failed > 0 {
            StepResult::failed(step, format!("{failed} of {total} failed"))
        } else {
            let outputs: serde_json::Map<String, Value> = children
                .iter()
                .map(|c| (c.step_id.clone(), c.payload.clone()))
                .collect();
            StepResult::succeeded(step, Value::Object(outputs))
        };

        result
            .with_metadata("failed", json!(failed))
            .with_metadata("total", json!(total))
            .with_children(children)
    }

    async fn run_loop(
        &self,
        step: &Step,
        items: Vec<Value>,
        body: &Arc<Step>,
        iterator_var: &str,
        ctx: &mut ChainContext,
    ) -> StepResult {
        let index_var = format!("{iterator_var}_index");
        let saved_item = ctx.get_state(iterator_var).cloned();
        let saved_index = ctx.get_state(&index_var).cloned();
        let total = items.len();
        let mut children: Vec<StepResult> = Vec::with_capacity(total);
        let mut interrupted = false;

        for (index, item) in items.into_iter().enumerate() {
            if ctx.is_cancelled() {
                interrupted = true;
                break;
            }

            ctx.set_state(iterator_var, item);
            ctx.set_state(index_var.as_str(), json!(index));
            ctx.emit_progress(
                Some(&step.id),
                format!("Iteration {} of {}", index + 1, total),
                percent(index, total),
            );

            let child = self.run_with_retry(body, ctx, &[]).await;

            ctx.restore_state(iterator_var, saved_item.clone());
            ctx.restore_state(&index_var, saved_index.clone());

            let child = child.with_metadata("iteration", json!(index));
            ctx.record_nested(&child);
            let stop = !child.is_success();
            children.push(child);
            if stop {
                break;
            }
        }

        let completed = children.len();
        let last_status = children.last().map(|c| c.status);
        let result = if interrupted || last_status == Some(StepStatus::Cancelled) {
            StepResult::cancelled(
                step,
                format!("loop cancelled after {completed} of {total} iterations"),
            )
        } else if let Some(failed) = children.last().filter(|c| !c.is_success()) {
            StepResult::failed(
                step,
                format!(
                    "iteration {} of {} failed: {}",
                    completed,
                    total,
                    failed.error.as_deref().unwrap_or("unknown error")
                ),
            )
        } else {
            StepResult::succeeded(
                step,
                Value::Array(children.iter().map(|c| c.payload.clone()).collect()),
            )
        };

        result
            .with_metadata("iterations", json!(completed))
            .with_metadata("total", json!(total))
            .with_children(children)
    }
}

/// Decide whether a top-level step runs given its dependencies' outcomes
fn gate(step: &Step, ctx: &ChainContext) -> Gate {
    let outcomes: Vec<&StepResult> = step
        .depends_on
        .iter()
        .filter_map(|dep| ctx.step_result(dep))
        .collect();

    if matches!(step.kind, StepKind::ErrorHandler { .. }) {
        let failures: Vec<StepResult> = outcomes
            .into_iter()
            .filter(|r| r.status == StepStatus::Failed)
            .cloned()
            .collect();
        return if failures.is_empty() {
            Gate::Skip("no dependency failed".to_string())
        } else {
            Gate::Run(failures)
        };
    }

    match outcomes.iter().find(|r| !r.is_success()) {
        Some(blocked) => Gate::Skip(format!("dependency '{}' did not succeed", blocked.step_id)),
        None => Gate::Run(Vec::new()),
    }
}

/// Failed top-level steps not claimed by a successful error handler
fn unrecovered_failures(results: &[StepResult]) -> usize {
    let recovered: HashSet<&str> = results
        .iter()
        .filter(|r| r.is_success())
        .filter_map(|r| r.metadata.get("recovered_from"))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_str)
        .collect();

    results
        .iter()
        .filter(|r| r.status == StepStatus::Failed && !recovered.contains(r.step_id.as_str()))
        .count()
}

fn handler_failure(step: &Step, error: WorkflowError) -> StepResult {
    if matches!(error, WorkflowError::Cancelled) {
        StepResult::cancelled(step, error.to_string())
    } else {
        StepResult::failed(step, error.to_string())
    }
}

fn status_label(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Succeeded => "succeeded",
        StepStatus::Failed => "failed",
        StepStatus::Skipped => "skipped",
        StepStatus::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::ChainBuilder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Echoes its parameters; fails when `fail` is true
    struct EchoExecutor {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(
            &self,
            tool_id: &str,
            parameters: &ToolParameters,
            _ctx: &ExecutionContext,
        ) -> Result<ToolResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if tool_id == "missing" {
                return Err(ToolweaveError::UnknownTool(tool_id.to_string()));
            }
            if parameters.get("fail") == Some(&Value::Bool(true)) {
                return Ok(ToolResult::from_fault(tool_id, ToolFault::transient("flaky")));
            }
            Ok(ToolResult::success(tool_id, json!(parameters)))
        }
    }

    fn engine() -> (ChainEngine, Arc<EchoExecutor>) {
        let executor = Arc::new(EchoExecutor {
            calls: AtomicU32::new(0),
        });
        (ChainEngine::new(executor.clone()), executor)
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = EngineConfig::default().with_retry_delay(Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(20), Duration::from_secs(30));
    }

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());
        let bad = EngineConfig {
            retry_backoff: 0.5,
            ..EngineConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_tool_parameters_resolved() {
        let (engine, _) = engine();
        let chain = ChainBuilder::new("resolve")
            .step(Step::tool("first", "echo").param("name", "{{params.user}}"))
            .step(
                Step::tool("second", "echo")
                    .param("greeting", "hello {{steps.first.name}}")
                    .depends_on("first"),
            )
            .build()
            .unwrap();

        let mut params = HashMap::new();
        params.insert("user".to_string(), json!("ada"));
        let result = engine.run(&chain, params, ExecutionContext::new()).await;

        assert!(result.success);
        assert_eq!(result.output("second").unwrap()["greeting"], "hello ada");
        assert_eq!(result.step("second").unwrap().metadata["tool_id"], "echo");
    }

    #[tokio::test]
    async fn test_retry_until_exhausted() {
        let (engine, executor) = engine();
        let chain = ChainBuilder::new("retry")
            .step(Step::tool("flaky", "echo").param("fail", true).retry(2))
            .build()
            .unwrap();

        let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

        let step = result.step("flaky").unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.attempts, 3);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_not_retried() {
        let (engine, executor) = engine();
        let chain = ChainBuilder::new("unknown")
            .step(Step::tool("call", "missing").retry(5))
            .build()
            .unwrap();

        let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result.step("call").unwrap().attempts, 1);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_dependency_skips_dependents() {
        let (engine, _) = engine();
        let chain = ChainBuilder::new("skip")
            .step(Step::tool("a", "echo").param("fail", true))
            .step(Step::tool("b", "echo").depends_on("a"))
            .step(Step::tool("c", "echo"))
            .build()
            .unwrap();

        let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

        assert_eq!(result.failed(), vec!["a"]);
        assert_eq!(result.skipped(), vec!["b"]);
        assert_eq!(result.succeeded(), vec!["c"]);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_conditional_without_else_is_noop() {
        let (engine, executor) = engine();
        let chain = ChainBuilder::new("cond")
            .step(Step::conditional("maybe", |_| false, Step::tool("never", "echo")))
            .build()
            .unwrap();

        let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

        let step = result.step("maybe").unwrap();
        assert!(step.is_success());
        assert_eq!(step.metadata["branch"], "none");
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_progress_reaches_completion() {
        let (engine, _) = engine();
        let chain = ChainBuilder::new("progress")
            .step(Step::tool("a", "echo"))
            .step(Step::tool("b", "echo"))
            .build()
            .unwrap();

        let (tx, mut rx) = engine.progress_channel();
        engine
            .run_with_progress(&chain, HashMap::new(), ExecutionContext::new(), tx)
            .await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.first().map(|e| e.percentage), Some(0));
        assert_eq!(events.last().map(|e| e.percentage), Some(100));
        assert!(events.iter().any(|e| e.step_id.as_deref() == Some("b")));
        assert!(events.windows(2).all(|w| w[0].percentage <= w[1].percentage));
    }
}
