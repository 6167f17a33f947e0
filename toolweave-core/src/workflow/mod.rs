//! Tool chains
//!
//! A chain is a validated graph of steps run by the [`ChainEngine`]:
//!
//! - **Tool**: invoke a tool, resolving `{{steps.*}}`, `{{params.*}}` and
//!   `{{state.*}}` expressions in its parameters
//! - **Conditional**: run one of two branches
//! - **Parallel**: fan out sub-steps concurrently and join on all of them
//! - **Transform**: map the previous payload with a pure function
//! - **Loop**: run a body once per item with a scoped iterator variable
//! - **Custom / ErrorHandler**: bespoke logic and failure recovery
//!
//! # Example
//!
//! ```rust,ignore
//! use toolweave_core::workflow::{ChainBuilder, ChainEngine, Step};
//!
//! let chain = ChainBuilder::new("ingest")
//!     .step(Step::tool("list", "list_dir").param("path", "{{params.root}}"))
//!     .step(
//!         Step::loop_over("read_all", |ctx| files(ctx), "file",
//!             Step::tool("read", "read_file").param("path", "{{state.file}}"))
//!         .depends_on("list"),
//!     )
//!     .build()?;
//!
//! let result = ChainEngine::new(executor).run(&chain, params, ExecutionContext::new()).await;
//! ```

mod chain;
mod context;
mod engine;
mod error;
mod expression;
mod progress;
mod result;
mod step;

pub use chain::{Chain, ChainBuilder};
pub use context::ChainContext;
pub use engine::{ChainEngine, EngineConfig};
pub use error::{BuildIssue, ChainBuildError, WorkflowError, WorkflowResult};
pub use expression::{Expression, resolve_parameters, resolve_value};
pub use progress::{ProgressEvent, ProgressReceiver, ProgressSender, progress_channel};
pub use result::{ChainResult, StepResult, StepStatus};
pub use step::{
    ErrorHandler, ItemsFn, Predicate, RetryPolicy, Step, StepBuilder, StepHandler, StepKind,
    TransformFn,
};
