//! Sequential step pipeline.
//!
//! A pipeline owns an ordered list of asynchronous steps. The context is
//! moved into each step and handed back through a [`Flow`] value, so exactly
//! one step holds it at any time:
//!
//! - `Continue(ctx)` runs the next step
//! - `Stop(ctx)` skips the remaining steps and completes successfully
//! - `Fail(ctx, err)` aborts and surfaces `err` unchanged
//!
//! The runner itself performs no I/O and never retries.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use stratus_protocol::BrokerError;
use tracing::{debug, warn};

/// What a step hands back to the runner.
#[derive(Debug)]
pub enum Flow<C> {
    Continue(C),
    Stop(C),
    Fail(C, BrokerError),
}

/// Step decision without the context, for steps written against `&mut C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

impl<C> Flow<C> {
    /// Reattach the context to a step decision.
    pub fn resolve(context: C, result: Result<Control, BrokerError>) -> Self {
        match result {
            Ok(Control::Continue) => Flow::Continue(context),
            Ok(Control::Stop) => Flow::Stop(context),
            Err(err) => Flow::Fail(context, err),
        }
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Every step returned `Continue`
    Finished,
    /// The named step returned `Stop`
    Stopped { step: String },
}

/// Result of a pipeline run. The context is always returned, including on
/// failure, as the failing step left it.
#[derive(Debug)]
pub struct PipelineRun<C> {
    pub context: C,
    pub outcome: Result<Completion, BrokerError>,
}

impl<C> PipelineRun<C> {
    pub fn is_stopped(&self) -> bool {
        matches!(self.outcome, Ok(Completion::Stopped { .. }))
    }

    /// Drop the completion detail, keeping the context on success.
    pub fn into_result(self) -> Result<C, BrokerError> {
        self.outcome.map(|_| self.context)
    }
}

pub type StepFuture<C> = Pin<Box<dyn Future<Output = Flow<C>> + Send>>;

struct Step<C> {
    name: String,
    run: Box<dyn Fn(C) -> StepFuture<C> + Send + Sync>,
}

/// An ordered, reusable list of steps.
pub struct Pipeline<C> {
    name: String,
    steps: Vec<Step<C>>,
}

impl<C: Send + 'static> Pipeline<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Flow<C>> + Send + 'static,
    {
        self.steps.push(Step {
            name: name.to_string(),
            run: Box::new(move |ctx| Box::pin(f(ctx))),
        });
        self
    }

    /// Append a step that also receives a shared collaborator.
    pub fn step_with<S, F, Fut>(self, name: &str, shared: Arc<S>, f: F) -> Self
    where
        S: Send + Sync + ?Sized + 'static,
        F: Fn(Arc<S>, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Flow<C>> + Send + 'static,
    {
        self.step(name, move |ctx| f(Arc::clone(&shared), ctx))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run every step in order over `context`.
    pub async fn run(&self, context: C) -> PipelineRun<C> {
        let mut context = context;
        for (index, step) in self.steps.iter().enumerate() {
            debug!(
                pipeline = %self.name,
                step = %step.name,
                "step {}/{}",
                index + 1,
                self.steps.len()
            );
            match (step.run)(context).await {
                Flow::Continue(next) => context = next,
                Flow::Stop(next) => {
                    debug!(pipeline = %self.name, step = %step.name, "stopped early");
                    return PipelineRun {
                        context: next,
                        outcome: Ok(Completion::Stopped {
                            step: step.name.clone(),
                        }),
                    };
                }
                Flow::Fail(next, err) => {
                    warn!(pipeline = %self.name, step = %step.name, "step failed: {}", err);
                    return PipelineRun {
                        context: next,
                        outcome: Err(err),
                    };
                }
            }
        }
        PipelineRun {
            context,
            outcome: Ok(Completion::Finished),
        }
    }
}
