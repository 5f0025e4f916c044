//! Cooperative task framework.
//!
//! Every task is a resumable state machine driven by [`TaskNode::tick`]. A tick never blocks:
//! work is either short and inline, or handed to background threads whose results are
//! picked up on a later tick.

mod composite;
mod node;
mod scheduler;

pub use composite::{TaskParallel, TaskSequence};
pub use node::TaskNode;
pub use scheduler::TaskScheduler;

use crate::blackboard::Blackboard;
use crate::error::{IndexerError, Result};
use crate::events::PipelineEvent;
use srcgraph_includes::LogContext;
use srcgraph_store::PersistentSymbolStore;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Success,
    Failure,
}

/// One unit of orchestration work.
///
/// `enter` runs once before the first `update`; `update` is called once per tick until it
/// leaves [`TaskState::Running`]; `exit` runs after success. `terminate` runs at most once
/// when an entered task ends abnormally (its own failure, a failing sibling, cancellation)
/// and must leave shared resources such as the store mode in a sane state.
pub trait Task: Send {
    fn name(&self) -> &str;

    fn enter(&mut self, _ctx: &mut TaskContext<'_>) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskState>;

    fn exit(&mut self, _ctx: &mut TaskContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Back to the initial state so the task can run again.
    fn reset(&mut self) {}

    fn terminate(&mut self, _ctx: &mut TaskContext<'_>) {}
}

/// Everything a task may touch while it is being ticked.
pub struct TaskContext<'a> {
    pub blackboard: &'a mut Blackboard,
    pub store: &'a mut PersistentSymbolStore,
    pub log: &'a LogContext,
    cancel: CancellationToken,
    events: Option<UnboundedSender<PipelineEvent>>,
    failure: Option<IndexerError>,
    idle: bool,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        blackboard: &'a mut Blackboard,
        store: &'a mut PersistentSymbolStore,
        log: &'a LogContext,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            blackboard,
            store,
            log,
            cancel,
            events: None,
            failure: None,
            idle: false,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Sender for background threads that report progress on their own.
    #[must_use]
    pub fn event_sender(&self) -> Option<UnboundedSender<PipelineEvent>> {
        self.events.clone()
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            // Nobody listening is fine.
            let _ = events.send(event);
        }
    }

    /// Keep the first failure cause; later ones are usually consequences of it.
    pub fn record_failure(&mut self, err: IndexerError) {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&IndexerError> {
        self.failure.as_ref()
    }

    pub fn take_failure(&mut self) -> Option<IndexerError> {
        self.failure.take()
    }

    /// Signal that this tick only polled background work and found nothing new.
    pub fn set_idle(&mut self) {
        self.idle = true;
    }

    pub(crate) fn take_idle(&mut self) -> bool {
        std::mem::take(&mut self.idle)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Lifecycle calls observed by [`ScriptedTask`], shared across tasks of one test.
    pub type Journal = Arc<Mutex<Vec<String>>>;

    /// Task that returns a fixed sequence of states and journals every call.
    pub struct ScriptedTask {
        name: String,
        script: Vec<TaskState>,
        position: usize,
        journal: Journal,
    }

    impl ScriptedTask {
        pub fn new(name: &str, script: &[TaskState], journal: &Journal) -> Self {
            Self {
                name: name.to_string(),
                script: script.to_vec(),
                position: 0,
                journal: Arc::clone(journal),
            }
        }

        fn note(&self, event: &str) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{event}", self.name));
        }
    }

    impl Task for ScriptedTask {
        fn name(&self) -> &str {
            &self.name
        }

        fn enter(&mut self, _ctx: &mut TaskContext<'_>) -> Result<()> {
            self.note("enter");
            Ok(())
        }

        fn update(&mut self, _ctx: &mut TaskContext<'_>) -> Result<TaskState> {
            self.note("update");
            let state = self
                .script
                .get(self.position)
                .copied()
                .unwrap_or(TaskState::Success);
            self.position += 1;
            Ok(state)
        }

        fn exit(&mut self, _ctx: &mut TaskContext<'_>) -> Result<()> {
            self.note("exit");
            Ok(())
        }

        fn reset(&mut self) {
            self.position = 0;
            self.note("reset");
        }

        fn terminate(&mut self, _ctx: &mut TaskContext<'_>) {
            self.note("terminate");
        }
    }

    pub fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }
}
