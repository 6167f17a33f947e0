//! Chain engine behaviour end to end

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use toolweave_core::prelude::*;
use toolweave_core::workflow::WorkflowResult;

/// Test executor with a handful of scripted tools
#[derive(Default)]
struct ScriptedExecutor {
    calls: AtomicU32,
}

#[async_trait]
impl ToolExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        tool_id: &str,
        parameters: &ToolParameters,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match tool_id {
            "echo" => Ok(ToolResult::success(tool_id, json!(parameters))),
            "check" => {
                if parameters.get("n") == Some(&json!(3)) {
                    Ok(ToolResult::from_fault(tool_id, ToolFault::validation("three is not allowed")))
                } else {
                    Ok(ToolResult::success(tool_id, json!(parameters)))
                }
            }
            "fail" => Ok(ToolResult::failure(tool_id, "always fails")),
            "slow" => {
                let ms = parameters.get("ms").and_then(Value::as_u64).unwrap_or(100);
                tokio::select! {
                    _ = ctx.cancellation.cancelled() => Ok(ToolResult::cancelled(tool_id, "cancelled")),
                    _ = tokio::time::sleep(Duration::from_millis(ms)) => {
                        Ok(ToolResult::success(tool_id, json!({"slept": ms})))
                    }
                }
            }
            "log" => {
                let lines: Vec<String> = (1..=10).map(|i| format!("line {i}")).collect();
                Ok(ToolResult::success(tool_id, Value::String(lines.join("\n"))))
            }
            other => Err(ToolweaveError::UnknownTool(other.to_string())),
        }
    }
}

fn engine() -> (ChainEngine, Arc<ScriptedExecutor>) {
    let executor = Arc::new(ScriptedExecutor::default());
    (ChainEngine::new(executor.clone()), executor)
}

/// Writes a fixed value into shared state
struct SeedState {
    name: &'static str,
    value: Value,
}

#[async_trait]
impl StepHandler for SeedState {
    async fn handle(&self, ctx: &mut ChainContext) -> WorkflowResult<Value> {
        ctx.set_state(self.name, self.value.clone());
        Ok(self.value.clone())
    }
}

/// Recovers by reporting which steps failed
struct ReportFailures;

#[async_trait]
impl ErrorHandler for ReportFailures {
    async fn recover(&self, failures: &[StepResult], _ctx: &mut ChainContext) -> WorkflowResult<Value> {
        Ok(json!(failures.iter().map(|f| f.step_id.clone()).collect::<Vec<_>>()))
    }
}

/// Cancels the run on its second invocation
struct CancelOnSecond {
    seen: AtomicU32,
}

#[async_trait]
impl StepHandler for CancelOnSecond {
    async fn handle(&self, ctx: &mut ChainContext) -> WorkflowResult<Value> {
        if self.seen.fetch_add(1, Ordering::SeqCst) == 1 {
            ctx.execution().cancel();
        }
        Ok(Value::Null)
    }
}

/// Panics instead of returning a result
struct Explode;

#[async_trait]
impl StepHandler for Explode {
    async fn handle(&self, _ctx: &mut ChainContext) -> WorkflowResult<Value> {
        panic!("handler blew up");
    }
}

fn numbers(count: i64) -> impl Fn(&ChainContext) -> Vec<Value> + Send + Sync + 'static {
    move |_| (1..=count).map(|i| json!(i)).collect()
}

#[tokio::test]
async fn test_loop_fails_fast() {
    let (engine, executor) = engine();
    let chain = ChainBuilder::new("loop")
        .step(Step::loop_over(
            "each",
            numbers(5),
            "item",
            Step::tool("visit", "check").param("n", "{{state.item}}"),
        ))
        .build()
        .unwrap();

    let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

    let step = result.step("each").unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.children.len(), 3);
    assert!(step.children[..2].iter().all(StepResult::is_success));
    assert_eq!(step.children[2].status, StepStatus::Failed);
    assert!(step.error.as_deref().unwrap().contains("iteration 3 of 5"));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
    assert!(!result.success);
}

#[tokio::test]
async fn test_loop_exposes_item_and_index() {
    let (engine, _) = engine();
    let chain = ChainBuilder::new("loop")
        .step(Step::loop_over(
            "each",
            |_| vec![json!("a.txt"), json!("b.txt")],
            "file",
            Step::tool("visit", "echo")
                .param("path", "{{state.file}}")
                .param("index", "{{state.file_index}}"),
        ))
        .build()
        .unwrap();

    let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

    assert_eq!(
        result.output("each").unwrap(),
        &json!([{"path": "a.txt", "index": 0}, {"path": "b.txt", "index": 1}])
    );
}

#[tokio::test]
async fn test_loop_restores_iterator_variable() {
    for count in [0, 1, 4] {
        let (engine, _) = engine();
        let chain = ChainBuilder::new("scope")
            .step(Step::custom(
                "seed",
                SeedState {
                    name: "item",
                    value: json!("V"),
                },
            ))
            .step(
                Step::loop_over(
                    "each",
                    numbers(count),
                    "item",
                    Step::tool("visit", "echo").param("n", "{{state.item}}"),
                )
                .depends_on("seed"),
            )
            .build()
            .unwrap();

        let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

        assert!(result.success, "loop of {count} failed");
        assert_eq!(result.state.get("item"), Some(&json!("V")), "loop of {count}");
        assert!(!result.state.contains_key("item_index"));
        assert_eq!(result.step("each").unwrap().children.len(), count as usize);
    }
}

#[tokio::test]
async fn test_parallel_partial_failure() {
    let (engine, _) = engine();
    let chain = ChainBuilder::new("fan_out")
        .step(Step::parallel(
            "group",
            [
                Step::tool("one", "echo").param("n", 1),
                Step::tool("two", "fail"),
                Step::tool("three", "echo").param("n", 3),
                Step::tool("four", "echo").param("n", 4),
            ],
        ))
        .build()
        .unwrap();

    let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

    let step = result.step("group").unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.error.as_deref(), Some("1 of 4 failed"));
    assert_eq!(step.children.len(), 4);
    assert_eq!(step.metadata["failed"], 1);
    assert_eq!(step.metadata["total"], 4);
    assert_eq!(result.step("three").unwrap().payload["n"], 3);
    assert_eq!(result.step("two").unwrap().status, StepStatus::Failed);
}

#[tokio::test]
async fn test_parallel_captures_panicking_sub_step() {
    let (engine, _) = engine();
    let chain = ChainBuilder::new("fan_out")
        .step(Step::parallel(
            "group",
            [
                Step::custom("boom", Explode),
                Step::tool("fine", "echo").param("n", 1),
            ],
        ))
        .step(Step::tool("after", "echo").param("n", 2))
        .build()
        .unwrap();

    let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

    let step = result.step("group").unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.error.as_deref(), Some("1 of 2 failed"));
    assert_eq!(step.children.len(), 2);

    let boom = result.step("boom").unwrap();
    assert_eq!(boom.status, StepStatus::Failed);
    assert!(boom.error.as_deref().unwrap().contains("sub-step aborted"));
    assert!(result.step("fine").unwrap().is_success());
    assert!(result.step("after").unwrap().is_success());
}

#[tokio::test]
async fn test_parallel_runs_concurrently() {
    let (engine, _) = engine();
    let chain = ChainBuilder::new("fan_out")
        .step(Step::parallel(
            "group",
            (0..4).map(|i| Step::tool(format!("nap_{i}"), "slow").param("ms", 200)),
        ))
        .build()
        .unwrap();

    let start = Instant::now();
    let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

    assert!(result.success);
    assert!(start.elapsed() < Duration::from_millis(600));
    let payload = result.output("group").unwrap();
    assert_eq!(payload.as_object().unwrap().len(), 4);
}

#[tokio::test]
async fn test_conditional_takes_else_branch() {
    let (engine, _) = engine();
    let chain = ChainBuilder::new("branching")
        .step(
            Step::conditional(
                "mode",
                |ctx| ctx.param("mode") == Some(&json!("full")),
                Step::tool("full_scan", "echo").param("depth", 10),
            )
            .otherwise(Step::tool("quick_scan", "echo").param("depth", 1)),
        )
        .build()
        .unwrap();

    let mut params = HashMap::new();
    params.insert("mode".to_string(), json!("quick"));
    let result = engine.run(&chain, params, ExecutionContext::new()).await;

    let step = result.step("mode").unwrap();
    assert!(step.is_success());
    assert_eq!(step.metadata["branch"], "else");
    assert_eq!(step.payload["depth"], 1);
    assert!(result.step("full_scan").is_none());
}

#[tokio::test]
async fn test_transform_uses_previous_result() {
    let (engine, _) = engine();
    let chain = ChainBuilder::new("transform")
        .step(Step::tool("count", "echo").param("total", 21))
        .step(
            Step::transform("double", |previous, _| {
                let total = previous
                    .and_then(|v| v["total"].as_i64())
                    .ok_or_else(|| WorkflowError::Transform("missing total".into()))?;
                Ok(json!(total * 2))
            })
            .depends_on("count"),
        )
        .build()
        .unwrap();

    let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

    assert_eq!(result.final_output(), Some(&json!(42)));
}

#[tokio::test]
async fn test_error_handler_recovers_failed_dependency() {
    let (engine, _) = engine();
    let chain = ChainBuilder::new("recovery")
        .step(Step::tool("fetch", "fail"))
        .step(Step::tool("parse", "echo").depends_on("fetch"))
        .step(Step::error_handler("fallback", ReportFailures).depends_on("fetch"))
        .step(Step::tool("fine", "echo"))
        .step(Step::error_handler("unused", ReportFailures).depends_on("fine"))
        .build()
        .unwrap();

    let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

    assert_eq!(result.failed(), vec!["fetch"]);
    assert_eq!(result.skipped(), vec!["parse", "unused"]);
    assert_eq!(result.output("fallback"), Some(&json!(["fetch"])));
    assert!(result.success);
}

#[tokio::test]
async fn test_cancellation_mid_chain() {
    let (engine, _) = engine();
    let chain = ChainBuilder::new("cancel")
        .step(Step::tool("long", "slow").param("ms", 5_000))
        .step(Step::tool("after", "echo").depends_on("long"))
        .build()
        .unwrap();

    let exec = ExecutionContext::new();
    let token = exec.cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let result = engine.run(&chain, HashMap::new(), exec).await;

    assert!(result.cancelled);
    assert!(!result.success);
    assert_eq!(result.step("long").unwrap().status, StepStatus::Cancelled);
    assert_eq!(result.step("after").unwrap().status, StepStatus::Cancelled);
}

#[tokio::test]
async fn test_loop_checks_cancellation_between_items() {
    let (engine, _) = engine();
    let chain = ChainBuilder::new("cancel_loop")
        .step(Step::loop_over(
            "each",
            numbers(5),
            "item",
            Step::custom(
                "body",
                CancelOnSecond {
                    seen: AtomicU32::new(0),
                },
            ),
        ))
        .build()
        .unwrap();

    let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

    let step = result.step("each").unwrap();
    assert_eq!(step.status, StepStatus::Cancelled);
    assert_eq!(step.children.len(), 2);
    assert!(result.cancelled);
}

#[tokio::test]
async fn test_retry_recovers_from_transient_failure() {
    struct FlakyOnce {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ToolExecutor for FlakyOnce {
        async fn execute(
            &self,
            tool_id: &str,
            _parameters: &ToolParameters,
            _ctx: &ExecutionContext,
        ) -> Result<ToolResult> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(ToolResult::from_fault(tool_id, ToolFault::transient("connection reset")))
            } else {
                Ok(ToolResult::success(tool_id, json!("ok")))
            }
        }
    }

    let engine = ChainEngine::with_config(
        Arc::new(FlakyOnce {
            calls: AtomicU32::new(0),
        }),
        EngineConfig::default()
            .with_default_max_retries(2)
            .with_retry_delay(Duration::from_millis(5)),
    );
    let chain = ChainBuilder::new("retry")
        .step(Step::tool("fetch", "web_fetch"))
        .build()
        .unwrap();

    let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

    let step = result.step("fetch").unwrap();
    assert!(step.is_success());
    assert_eq!(step.attempts, 2);
}

#[tokio::test]
async fn test_chain_through_cached_executor() {
    let inner = Arc::new(ScriptedExecutor::default());
    let cache = Arc::new(ExecutionCache::new(CacheConfig::default()));
    let executor = Arc::new(CachedToolExecutor::new(inner.clone(), cache.clone()));
    let engine = ChainEngine::new(executor);

    let chain = ChainBuilder::new("cached")
        .step(Step::tool("first", "echo").param("q", "{{params.q}}"))
        .step(Step::tool("second", "echo").param("q", "{{params.q}}"))
        .build()
        .unwrap();

    let mut params = HashMap::new();
    params.insert("q".to_string(), json!("rust"));
    let result = engine.run(&chain, params, ExecutionContext::new()).await;

    assert!(result.success);
    assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.step("second").unwrap().metadata["cache_hit"], true);
    assert_eq!(cache.statistics().hits, 1);
}

#[tokio::test]
async fn test_tool_output_limited_by_shape() {
    let (engine, _) = engine();
    let limiter = OutputLimiter::new(LimiterConfig {
        log_head_lines: 2,
        log_tail_lines: 2,
        ..LimiterConfig::default()
    });
    let engine = engine.with_limiter(Arc::new(limiter));
    let chain = ChainBuilder::new("logs")
        .step(Step::tool("tail", "log").output_shape(OutputShape::Logs))
        .build()
        .unwrap();

    let result = engine.run(&chain, HashMap::new(), ExecutionContext::new()).await;

    let step = result.step("tail").unwrap();
    assert_eq!(step.metadata["truncated"], true);
    assert_eq!(
        step.payload,
        json!("line 1\nline 2\n[... 6 lines omitted ...]\nline 9\nline 10")
    );
}

#[test]
fn test_malformed_chain_never_runs() {
    let err = ChainBuilder::new("bad")
        .step(Step::tool("a", "echo").depends_on("b"))
        .step(Step::tool("b", "echo").depends_on("a"))
        .step(Step::tool("c", "echo").depends_on("zzz"))
        .build()
        .map_err(ToolweaveError::from)
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("unknown step 'zzz'"));
    assert!(message.contains("cycle"));
}
