//! Chain step definitions
//!
//! Every step shares an id, a name, its dependency ids and a retry policy; what
//! it does is one of a closed set of [`StepKind`] variants, all dispatched by
//! the engine.

use super::context::ChainContext;
use super::error::WorkflowResult;
use super::result::StepResult;
use crate::limiter::OutputShape;
use crate::tools::ToolParameters;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Predicate deciding which branch a conditional step takes
pub type Predicate = Arc<dyn Fn(&ChainContext) -> bool + Send + Sync>;

/// Pure function over the previous step's payload and the run context
pub type TransformFn = Arc<dyn Fn(Option<&Value>, &ChainContext) -> WorkflowResult<Value> + Send + Sync>;

/// Produces the items a loop step iterates over
pub type ItemsFn = Arc<dyn Fn(&ChainContext) -> Vec<Value> + Send + Sync>;

/// Bespoke step logic
///
/// Handlers may write shared state; inside a parallel step those writes stay
/// local to the sub-step's snapshot.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(&self, ctx: &mut ChainContext) -> WorkflowResult<Value>;
}

/// Recovery logic run when at least one dependency failed
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// `failures` holds the results of the dependencies that failed
    async fn recover(&self, failures: &[StepResult], ctx: &mut ChainContext) -> WorkflowResult<Value>;
}

/// What a step does
#[derive(Clone)]
pub enum StepKind {
    /// Invoke a tool through the executor
    Tool {
        tool_id: String,
        /// Values may contain `{{...}}` expressions
        parameters: ToolParameters,
        /// Limit the payload with this shape before storing it
        output_shape: Option<OutputShape>,
    },
    /// Run exactly one of two branches
    Conditional {
        condition: Predicate,
        then_step: Arc<Step>,
        else_step: Option<Arc<Step>>,
    },
    /// Run sub-steps concurrently and join on all of them
    Parallel { steps: Vec<Arc<Step>> },
    Transform { transform: TransformFn },
    /// Run `body` once per item, sequentially
    Loop {
        items: ItemsFn,
        body: Arc<Step>,
        /// State key holding the current item; its index goes in `<var>_index`
        iterator_var: String,
    },
    Custom { handler: Arc<dyn StepHandler> },
    /// Runs only when a dependency failed
    ErrorHandler { handler: Arc<dyn ErrorHandler> },
}

impl StepKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Tool { .. } => "tool",
            StepKind::Conditional { .. } => "conditional",
            StepKind::Parallel { .. } => "parallel",
            StepKind::Transform { .. } => "transform",
            StepKind::Loop { .. } => "loop",
            StepKind::Custom { .. } => "custom",
            StepKind::ErrorHandler { .. } => "error_handler",
        }
    }

    /// Steps owned by this one
    pub fn children(&self) -> Vec<&Arc<Step>> {
        match self {
            StepKind::Conditional {
                then_step,
                else_step,
                ..
            } => std::iter::once(then_step).chain(else_step.iter()).collect(),
            StepKind::Parallel { steps } => steps.iter().collect(),
            StepKind::Loop { body, .. } => vec![body],
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Debug for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Tool {
                tool_id,
                parameters,
                output_shape,
            } => f
                .debug_struct("Tool")
                .field("tool_id", tool_id)
                .field("parameters", parameters)
                .field("output_shape", output_shape)
                .finish(),
            StepKind::Conditional {
                then_step,
                else_step,
                ..
            } => f
                .debug_struct("Conditional")
                .field("then_step", &then_step.id)
                .field("else_step", &else_step.as_ref().map(|s| &s.id))
                .finish(),
            StepKind::Parallel { steps } => f
                .debug_struct("Parallel")
                .field("steps", &steps.iter().map(|s| &s.id).collect::<Vec<_>>())
                .finish(),
            StepKind::Loop {
                body, iterator_var, ..
            } => f
                .debug_struct("Loop")
                .field("body", &body.id)
                .field("iterator_var", iterator_var)
                .finish(),
            other => f.write_str(other.type_name()),
        }
    }
}

/// Retry behaviour of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retryable: bool,
    /// `None` uses the engine default
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retryable: true,
            max_retries: None,
        }
    }
}

/// One node in a chain
#[derive(Debug, Clone)]
pub struct Step {
    pub id: String,
    pub name: String,
    pub kind: StepKind,
    /// Only consulted for top-level steps
    pub depends_on: Vec<String>,
    pub retry: RetryPolicy,
}

impl Step {
    fn builder(id: impl Into<String>, kind: StepKind) -> StepBuilder {
        let id = id.into();
        StepBuilder {
            step: Step {
                name: id.clone(),
                id,
                kind,
                depends_on: Vec::new(),
                retry: RetryPolicy::default(),
            },
        }
    }

    /// Invoke `tool_id`
    pub fn tool(id: impl Into<String>, tool_id: impl Into<String>) -> StepBuilder {
        Self::builder(
            id,
            StepKind::Tool {
                tool_id: tool_id.into(),
                parameters: ToolParameters::new(),
                output_shape: None,
            },
        )
    }

    /// Run `then_step` when `condition` holds, else the optional
    /// [`otherwise`](StepBuilder::otherwise) branch
    pub fn conditional<F>(id: impl Into<String>, condition: F, then_step: impl Into<Step>) -> StepBuilder
    where
        F: Fn(&ChainContext) -> bool + Send + Sync + 'static,
    {
        Self::builder(
            id,
            StepKind::Conditional {
                condition: Arc::new(condition),
                then_step: Arc::new(then_step.into()),
                else_step: None,
            },
        )
    }

    pub fn parallel<S: Into<Step>>(id: impl Into<String>, steps: impl IntoIterator<Item = S>) -> StepBuilder {
        Self::builder(
            id,
            StepKind::Parallel {
                steps: steps.into_iter().map(|s| Arc::new(s.into())).collect(),
            },
        )
    }

    pub fn transform<F>(id: impl Into<String>, transform: F) -> StepBuilder
    where
        F: Fn(Option<&Value>, &ChainContext) -> WorkflowResult<Value> + Send + Sync + 'static,
    {
        Self::builder(
            id,
            StepKind::Transform {
                transform: Arc::new(transform),
            },
        )
    }

    /// Run `body` once per item produced by `items`
    pub fn loop_over<F>(
        id: impl Into<String>,
        items: F,
        iterator_var: impl Into<String>,
        body: impl Into<Step>,
    ) -> StepBuilder
    where
        F: Fn(&ChainContext) -> Vec<Value> + Send + Sync + 'static,
    {
        Self::builder(
            id,
            StepKind::Loop {
                items: Arc::new(items),
                body: Arc::new(body.into()),
                iterator_var: iterator_var.into(),
            },
        )
    }

    pub fn custom(id: impl Into<String>, handler: impl StepHandler + 'static) -> StepBuilder {
        Self::builder(
            id,
            StepKind::Custom {
                handler: Arc::new(handler),
            },
        )
    }

    pub fn error_handler(id: impl Into<String>, handler: impl ErrorHandler + 'static) -> StepBuilder {
        Self::builder(
            id,
            StepKind::ErrorHandler {
                handler: Arc::new(handler),
            },
        )
    }
}

/// Builder for [`Step`]
#[derive(Debug, Clone)]
pub struct StepBuilder {
    step: Step,
}

impl StepBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.step.name = name.into();
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.step.depends_on.push(id.into());
        self
    }

    /// Retry a failed step up to `max_retries` more times
    pub fn retry(mut self, max_retries: u32) -> Self {
        self.step.retry = RetryPolicy {
            retryable: true,
            max_retries: Some(max_retries),
        };
        self
    }

    pub fn no_retry(mut self) -> Self {
        self.step.retry.retryable = false;
        self
    }

    /// Add a tool parameter; ignored for other step kinds
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let StepKind::Tool { parameters, .. } = &mut self.step.kind {
            parameters.insert(name.into(), value.into());
        }
        self
    }

    /// Replace all tool parameters; ignored for other step kinds
    pub fn params(mut self, params: ToolParameters) -> Self {
        if let StepKind::Tool { parameters, .. } = &mut self.step.kind {
            *parameters = params;
        }
        self
    }

    /// Limit a tool step's payload with this shape
    pub fn output_shape(mut self, shape: OutputShape) -> Self {
        if let StepKind::Tool { output_shape, .. } = &mut self.step.kind {
            *output_shape = Some(shape);
        }
        self
    }

    /// Branch taken when a conditional's predicate is false
    pub fn otherwise(mut self, step: impl Into<Step>) -> Self {
        if let StepKind::Conditional { else_step, .. } = &mut self.step.kind {
            *else_step = Some(Arc::new(step.into()));
        }
        self
    }

    pub fn build(self) -> Step {
        self.step
    }
}

impl From<StepBuilder> for Step {
    fn from(builder: StepBuilder) -> Self {
        builder.build()
    }
}
