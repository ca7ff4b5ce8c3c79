//! Generic ordered, cancellable async pipeline.
//!
//! A [`Pipeline`] is a flat list of [`PipelineStep`]s run against one
//! [`NavigationInstruction`]. Each step receives a [`Next`] continuation and
//! finishes by returning exactly one of:
//!
//! - `next.proceed().await`, which runs the following step (or completes when
//!   none is left);
//! - `next.complete(output)`, which ends the run successfully;
//! - `next.cancel(output)`, which ends the run without completing;
//! - `next.reject(output)`, which ends the run as failed.
//!
//! A step returning `Err` is treated as `next.reject(StepOutput::Error(err))`.
//!
//! ```ignore
//! struct Audit;
//!
//! #[async_trait(?Send)]
//! impl PipelineStep for Audit {
//!     async fn run(&self, instruction: Rc<NavigationInstruction>, next: Next)
//!         -> Result<PipelineResult, RouterError>
//!     {
//!         if instruction.fragment().starts_with("admin") {
//!             return Ok(next.cancel(StepOutput::Bool(false)));
//!         }
//!         Ok(next.proceed().await)
//!     }
//! }
//! ```

use crate::commands::NavigationCommand;
use crate::error::RouterError;
use crate::instruction::NavigationInstruction;
use crate::trace_log;
use async_trait::async_trait;
use futures::future::{FutureExt, LocalBoxFuture};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

// ============================================================================
// Results
// ============================================================================

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Completed,
    Canceled,
    Rejected,
    Running,
}

impl PipelineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Rejected => "rejected",
            Self::Running => "running",
        }
    }
}

/// Value carried out of a step or hook.
#[derive(Clone, Default)]
pub enum StepOutput {
    #[default]
    Empty,
    Bool(bool),
    Command(Rc<dyn NavigationCommand>),
    Error(RouterError),
    /// The request was dropped from the queue in favour of a newer one.
    Superseded,
}

impl StepOutput {
    pub fn command(command: impl NavigationCommand + 'static) -> Self {
        Self::Command(Rc::new(command))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn as_command(&self) -> Option<&Rc<dyn NavigationCommand>> {
        match self {
            Self::Command(command) => Some(command),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&RouterError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl From<bool> for StepOutput {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<RouterError> for StepOutput {
    fn from(err: RouterError) -> Self {
        Self::Error(err)
    }
}

impl fmt::Debug for StepOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Command(command) => f.debug_tuple("Command").field(command).finish(),
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Self::Superseded => f.write_str("Superseded"),
        }
    }
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub output: StepOutput,
    pub completed: bool,
}

impl PipelineResult {
    pub fn new(status: PipelineStatus, output: StepOutput) -> Self {
        Self {
            status,
            output,
            completed: status == PipelineStatus::Completed,
        }
    }

    /// Result handed to requests dropped from the queue.
    pub fn superseded() -> Self {
        Self::new(PipelineStatus::Canceled, StepOutput::Superseded)
    }
}

// ============================================================================
// Steps
// ============================================================================

/// One stage of the pipeline.
#[async_trait(?Send)]
pub trait PipelineStep {
    async fn run(
        &self,
        instruction: Rc<NavigationInstruction>,
        next: Next,
    ) -> Result<PipelineResult, RouterError>;

    fn name(&self) -> &str {
        "step"
    }

    /// Slots return their registered sub-steps; the pipeline splices them in
    /// place of the slot.
    fn get_steps(&self) -> Option<Vec<Rc<dyn PipelineStep>>> {
        None
    }
}

/// Continuation handed to each step.
#[derive(Clone)]
pub struct Next {
    instruction: Rc<NavigationInstruction>,
    steps: Rc<[Rc<dyn PipelineStep>]>,
    index: Rc<Cell<usize>>,
}

impl Next {
    fn new(instruction: Rc<NavigationInstruction>, steps: Rc<[Rc<dyn PipelineStep>]>) -> Self {
        Self {
            instruction,
            steps,
            index: Rc::new(Cell::new(0)),
        }
    }

    /// Run the next step, or complete if every step has run.
    pub fn proceed(&self) -> LocalBoxFuture<'static, PipelineResult> {
        let next = self.clone();
        async move {
            let index = next.index.get();
            next.index.set(index + 1);

            let Some(step) = next.steps.get(index).cloned() else {
                return next.complete(StepOutput::Empty);
            };

            trace_log!("Pipeline step {} '{}'", index, step.name());
            match step.run(Rc::clone(&next.instruction), next.clone()).await {
                Ok(result) => result,
                Err(err) => next.reject(StepOutput::Error(err)),
            }
        }
        .boxed_local()
    }

    pub fn complete(&self, output: impl Into<StepOutput>) -> PipelineResult {
        PipelineResult::new(PipelineStatus::Completed, output.into())
    }

    pub fn cancel(&self, output: impl Into<StepOutput>) -> PipelineResult {
        PipelineResult::new(PipelineStatus::Canceled, output.into())
    }

    pub fn reject(&self, output: impl Into<StepOutput>) -> PipelineResult {
        PipelineResult::new(PipelineStatus::Rejected, output.into())
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index.get())
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}

/// An ordered list of steps.
#[derive(Default, Clone)]
pub struct Pipeline {
    steps: Vec<Rc<dyn PipelineStep>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, expanding slots into their registered sub-steps.
    pub fn add_step(&mut self, step: Rc<dyn PipelineStep>) -> &mut Self {
        match step.get_steps() {
            Some(steps) => {
                for step in steps {
                    self.add_step(step);
                }
            }
            None => self.steps.push(step),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the flattened steps, in run order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn run(&self, instruction: Rc<NavigationInstruction>) -> LocalBoxFuture<'static, PipelineResult> {
        let steps: Rc<[Rc<dyn PipelineStep>]> = self.steps.clone().into();
        Next::new(instruction, steps).proceed()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::InstructionInit;
    use std::cell::RefCell;

    struct Record {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
        verdict: Verdict,
    }

    #[derive(Clone, Copy)]
    enum Verdict {
        Proceed,
        Cancel,
        Fail,
        Complete,
    }

    #[async_trait(?Send)]
    impl PipelineStep for Record {
        async fn run(
            &self,
            _instruction: Rc<NavigationInstruction>,
            next: Next,
        ) -> Result<PipelineResult, RouterError> {
            self.log.borrow_mut().push(self.name);
            match self.verdict {
                Verdict::Proceed => Ok(next.proceed().await),
                Verdict::Cancel => Ok(next.cancel(false)),
                Verdict::Fail => Err(RouterError::custom("step failed")),
                Verdict::Complete => Ok(next.complete(StepOutput::Empty)),
            }
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn step(
        name: &'static str,
        log: &Rc<RefCell<Vec<&'static str>>>,
        verdict: Verdict,
    ) -> Rc<dyn PipelineStep> {
        Rc::new(Record {
            name,
            log: Rc::clone(log),
            verdict,
        })
    }

    fn instruction() -> Rc<NavigationInstruction> {
        NavigationInstruction::new(InstructionInit::default())
    }

    #[test]
    fn test_runs_steps_in_order_and_completes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline
            .add_step(step("a", &log, Verdict::Proceed))
            .add_step(step("b", &log, Verdict::Proceed));

        let result = pollster::block_on(pipeline.run(instruction()));
        assert_eq!(result.status, PipelineStatus::Completed);
        assert!(result.completed);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_cancel_stops_later_steps() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline
            .add_step(step("a", &log, Verdict::Cancel))
            .add_step(step("b", &log, Verdict::Proceed));

        let result = pollster::block_on(pipeline.run(instruction()));
        assert_eq!(result.status, PipelineStatus::Canceled);
        assert!(!result.completed);
        assert!(matches!(result.output, StepOutput::Bool(false)));
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn test_step_error_becomes_reject() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline
            .add_step(step("a", &log, Verdict::Fail))
            .add_step(step("b", &log, Verdict::Proceed));

        let result = pollster::block_on(pipeline.run(instruction()));
        assert_eq!(result.status, PipelineStatus::Rejected);
        assert_eq!(result.output.as_error(), Some(&RouterError::custom("step failed")));
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn test_early_complete() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline
            .add_step(step("a", &log, Verdict::Complete))
            .add_step(step("b", &log, Verdict::Proceed));

        let result = pollster::block_on(pipeline.run(instruction()));
        assert!(result.completed);
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn test_empty_pipeline_completes() {
        let result = pollster::block_on(Pipeline::new().run(instruction()));
        assert_eq!(result.status, PipelineStatus::Completed);
    }

    #[test]
    fn test_superseded_result() {
        let result = PipelineResult::superseded();
        assert_eq!(result.status, PipelineStatus::Canceled);
        assert!(matches!(result.output, StepOutput::Superseded));
        assert!(!result.completed);
    }
}
