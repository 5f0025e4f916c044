use super::{Task, TaskContext, TaskNode, TaskState};
use crate::error::Result;

/// Runs children one after another; the first failure fails the sequence.
pub struct TaskSequence {
    name: String,
    children: Vec<TaskNode>,
    current: usize,
}

impl TaskSequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            current: 0,
        }
    }

    #[must_use]
    pub fn with(mut self, task: impl Task + 'static) -> Self {
        self.children.push(TaskNode::new(task));
        self
    }

    pub fn push(&mut self, node: TaskNode) {
        self.children.push(node);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Task for TaskSequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskState> {
        let Some(child) = self.children.get_mut(self.current) else {
            return Ok(TaskState::Success);
        };

        match child.tick(ctx) {
            TaskState::Running => Ok(TaskState::Running),
            TaskState::Failure => Ok(TaskState::Failure),
            TaskState::Success => {
                self.current += 1;
                if self.current < self.children.len() {
                    Ok(TaskState::Running)
                } else {
                    Ok(TaskState::Success)
                }
            }
        }
    }

    fn reset(&mut self) {
        self.current = 0;
        for child in &mut self.children {
            child.reset();
        }
    }

    fn terminate(&mut self, ctx: &mut TaskContext<'_>) {
        for child in &mut self.children {
            child.abort(ctx);
        }
    }
}

/// Ticks every unfinished child on each tick. Succeeds when all children succeeded; the
/// first failure aborts the siblings still running.
pub struct TaskParallel {
    name: String,
    children: Vec<TaskNode>,
}

impl TaskParallel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, task: impl Task + 'static) -> Self {
        self.children.push(TaskNode::new(task));
        self
    }

    pub fn push(&mut self, node: TaskNode) {
        self.children.push(node);
    }
}

impl Task for TaskParallel {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskState> {
        let mut all_done = true;
        for child in &mut self.children {
            match child.tick(ctx) {
                TaskState::Success => {}
                TaskState::Running => all_done = false,
                TaskState::Failure => return Ok(TaskState::Failure),
            }
        }
        Ok(if all_done {
            TaskState::Success
        } else {
            TaskState::Running
        })
    }

    fn reset(&mut self) {
        for child in &mut self.children {
            child.reset();
        }
    }

    fn terminate(&mut self, ctx: &mut TaskContext<'_>) {
        for child in &mut self.children {
            child.abort(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::Blackboard;
    use crate::task::testing::{entries, Journal, ScriptedTask};
    use pretty_assertions::assert_eq;
    use srcgraph_includes::LogContext;
    use srcgraph_store::PersistentSymbolStore;
    use tokio_util::sync::CancellationToken;

    use TaskState::{Failure, Running, Success};

    fn run_to_end(node: &mut TaskNode, ctx: &mut TaskContext<'_>) -> TaskState {
        loop {
            match node.tick(ctx) {
                Running => continue,
                state => return state,
            }
        }
    }

    #[test]
    fn sequence_runs_children_in_order() {
        let journal = Journal::default();
        let mut root = TaskNode::new(
            TaskSequence::new("seq")
                .with(ScriptedTask::new("a", &[Success], &journal))
                .with(ScriptedTask::new("b", &[Running, Success], &journal)),
        );
        let (mut board, mut store, log) =
            (Blackboard::new(), PersistentSymbolStore::in_memory(), LogContext::disabled());
        let mut ctx = TaskContext::new(&mut board, &mut store, &log, CancellationToken::new());

        assert_eq!(run_to_end(&mut root, &mut ctx), Success);
        assert_eq!(
            entries(&journal),
            vec![
                "a:enter", "a:update", "a:exit", "b:enter", "b:update", "b:update", "b:exit"
            ]
        );
    }

    #[test]
    fn failing_child_stops_the_sequence_and_terminates_only_itself() {
        let journal = Journal::default();
        let mut root = TaskNode::new(
            TaskSequence::new("seq")
                .with(ScriptedTask::new("a", &[Success], &journal))
                .with(ScriptedTask::new("b", &[Running, Failure], &journal))
                .with(ScriptedTask::new("c", &[Success], &journal)),
        );
        let (mut board, mut store, log) =
            (Blackboard::new(), PersistentSymbolStore::in_memory(), LogContext::disabled());
        let mut ctx = TaskContext::new(&mut board, &mut store, &log, CancellationToken::new());

        assert_eq!(run_to_end(&mut root, &mut ctx), Failure);
        let calls = entries(&journal);
        assert_eq!(calls.iter().filter(|c| *c == "b:terminate").count(), 1);
        assert!(!calls.iter().any(|c| c.starts_with("c:")));
        assert!(!calls.contains(&"a:terminate".to_string()));
    }

    #[test]
    fn parallel_failure_aborts_running_siblings() {
        let journal = Journal::default();
        let mut root = TaskNode::new(
            TaskParallel::new("par")
                .with(ScriptedTask::new("slow", &[Running, Running, Running], &journal))
                .with(ScriptedTask::new("quick", &[Success], &journal))
                .with(ScriptedTask::new("bad", &[Running, Failure], &journal)),
        );
        let (mut board, mut store, log) =
            (Blackboard::new(), PersistentSymbolStore::in_memory(), LogContext::disabled());
        let mut ctx = TaskContext::new(&mut board, &mut store, &log, CancellationToken::new());

        assert_eq!(run_to_end(&mut root, &mut ctx), Failure);
        let calls = entries(&journal);
        assert_eq!(calls.iter().filter(|c| *c == "slow:terminate").count(), 1);
        assert_eq!(calls.iter().filter(|c| *c == "bad:terminate").count(), 1);
        assert!(!calls.contains(&"quick:terminate".to_string()));
        assert!(calls.contains(&"quick:exit".to_string()));
    }

    #[test]
    fn cancelled_sequence_terminates_the_active_child_once() {
        let journal = Journal::default();
        let mut root = TaskNode::new(
            TaskSequence::new("seq")
                .with(ScriptedTask::new("a", &[Running, Running, Running], &journal))
                .with(ScriptedTask::new("b", &[Success], &journal)),
        );
        let (mut board, mut store, log) =
            (Blackboard::new(), PersistentSymbolStore::in_memory(), LogContext::disabled());
        let cancel = CancellationToken::new();
        let mut ctx = TaskContext::new(&mut board, &mut store, &log, cancel.clone());

        assert_eq!(root.tick(&mut ctx), Running);
        cancel.cancel();
        assert_eq!(root.tick(&mut ctx), Failure);
        root.abort(&mut ctx);

        assert_eq!(entries(&journal), vec!["a:enter", "a:update", "a:terminate"]);
    }

    #[test]
    fn reset_makes_the_tree_reusable() {
        let journal = Journal::default();
        let mut root = TaskNode::new(
            TaskSequence::new("seq").with(ScriptedTask::new("a", &[Success], &journal)),
        );
        let (mut board, mut store, log) =
            (Blackboard::new(), PersistentSymbolStore::in_memory(), LogContext::disabled());
        let mut ctx = TaskContext::new(&mut board, &mut store, &log, CancellationToken::new());

        assert_eq!(run_to_end(&mut root, &mut ctx), Success);
        root.reset();
        assert_eq!(root.outcome(), None);
        assert_eq!(run_to_end(&mut root, &mut ctx), Success);
        assert_eq!(
            entries(&journal)
                .iter()
                .filter(|c| *c == "a:exit")
                .count(),
            2
        );
    }
}
