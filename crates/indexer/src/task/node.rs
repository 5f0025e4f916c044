use super::{Task, TaskContext, TaskState};
use crate::error::IndexerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Entered,
    Done(TaskState),
}

/// Drives one [`Task`] through its lifecycle.
///
/// Cancellation is checked before every update. Errors returned by the task count as
/// failure and are stored on the context.
pub struct TaskNode {
    task: Box<dyn Task>,
    phase: Phase,
}

impl TaskNode {
    pub fn new(task: impl Task + 'static) -> Self {
        Self::boxed(Box::new(task))
    }

    #[must_use]
    pub fn boxed(task: Box<dyn Task>) -> Self {
        Self {
            task,
            phase: Phase::Idle,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Final state, if the task has finished.
    #[must_use]
    pub const fn outcome(&self) -> Option<TaskState> {
        match self.phase {
            Phase::Done(state) => Some(state),
            Phase::Idle | Phase::Entered => None,
        }
    }

    #[must_use]
    pub fn is_entered(&self) -> bool {
        self.phase == Phase::Entered
    }

    pub fn tick(&mut self, ctx: &mut TaskContext<'_>) -> TaskState {
        if let Phase::Done(state) = self.phase {
            return state;
        }

        if ctx.is_cancelled() {
            ctx.record_failure(IndexerError::Cancelled);
            self.abort(ctx);
            return TaskState::Failure;
        }

        if self.phase == Phase::Idle {
            self.phase = Phase::Entered;
            log::debug!("Entering task {}", self.task.name());
            if let Err(err) = self.task.enter(ctx) {
                return self.fail(ctx, err);
            }
        }

        match self.task.update(ctx) {
            Ok(TaskState::Running) => TaskState::Running,
            Ok(TaskState::Success) => match self.task.exit(ctx) {
                Ok(()) => {
                    self.phase = Phase::Done(TaskState::Success);
                    TaskState::Success
                }
                Err(err) => self.fail(ctx, err),
            },
            Ok(TaskState::Failure) => {
                self.abort(ctx);
                TaskState::Failure
            }
            Err(err) => self.fail(ctx, err),
        }
    }

    fn fail(&mut self, ctx: &mut TaskContext<'_>, err: IndexerError) -> TaskState {
        log::debug!("Task {} failed: {err}", self.task.name());
        ctx.record_failure(err);
        self.abort(ctx);
        TaskState::Failure
    }

    /// End the task abnormally. Entered tasks are terminated exactly once; finished ones are
    /// left alone.
    pub fn abort(&mut self, ctx: &mut TaskContext<'_>) {
        match self.phase {
            Phase::Entered => {
                log::debug!("Terminating task {}", self.task.name());
                self.phase = Phase::Done(TaskState::Failure);
                self.task.terminate(ctx);
            }
            Phase::Idle => self.phase = Phase::Done(TaskState::Failure),
            Phase::Done(_) => {}
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.task.reset();
    }
}
