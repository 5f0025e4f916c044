use super::release_store;
use crate::blackboard::keys;
use crate::error::Result;
use crate::events::PipelineEvent;
use crate::report::{lock, IndexingReport, ReportSlot, SharedDecider};
use crate::task::{Task, TaskContext, TaskState};
use srcgraph_store::StoreMode;
use std::time::{Duration, Instant};

/// Last stage: back to read mode, compact, report, and ask what to do with the result.
pub struct FinishRun {
    decider: SharedDecider,
    slot: ReportSlot,
    started: Option<Instant>,
}

impl FinishRun {
    #[must_use]
    pub fn new(decider: SharedDecider, slot: ReportSlot) -> Self {
        Self {
            decider,
            slot,
            started: None,
        }
    }
}

fn stage_time(ctx: &TaskContext<'_>, key: &str) -> Duration {
    ctx.blackboard
        .get::<f64>(key)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or_default()
}

impl Task for FinishRun {
    fn name(&self) -> &str {
        "finish-run"
    }

    fn enter(&mut self, ctx: &mut TaskContext<'_>) -> Result<()> {
        ctx.emit(PipelineEvent::StageStarted {
            stage: self.name().to_string(),
        });
        self.started = Some(Instant::now());
        ctx.store.set_mode(StoreMode::Read)?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskState> {
        let compaction = ctx.store.optimize_memory()?;
        ctx.log.debug(format!(
            "Compaction removed {} nodes, {} edges, {} errors",
            compaction.removed_nodes, compaction.removed_edges, compaction.removed_errors
        ));

        let duration = self.started.map(|s| s.elapsed()).unwrap_or_default()
            + stage_time(ctx, keys::CLEAR_TIME)
            + stage_time(ctx, keys::INDEX_TIME);
        let mut report = IndexingReport::collect(ctx.blackboard, ctx.store, duration, None)?;
        ctx.log.info(report.status_line());

        let policy = lock(&*self.decider).decide(&report);
        policy.write_to(ctx.blackboard);
        report.policy = Some(policy);
        ctx.log.debug(format!("Store policy: {policy}"));

        ctx.emit(PipelineEvent::Finished(Box::new(report.clone())));
        *lock(&*self.slot) = Some(report);
        Ok(TaskState::Success)
    }

    fn reset(&mut self) {
        self.started = None;
    }

    fn terminate(&mut self, ctx: &mut TaskContext<'_>) {
        ctx.log
            .error("An unknown exception was thrown during indexing.");
        release_store(ctx.store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::Blackboard;
    use crate::report::{DatabasePolicy, PolicyDecider};
    use crate::task::TaskNode;
    use pretty_assertions::assert_eq;
    use srcgraph_includes::LogContext;
    use srcgraph_store::{ParserClient, PersistentSymbolStore};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    #[test]
    fn reports_and_records_the_decision() {
        let mut store = PersistentSymbolStore::in_memory();
        store.set_mode(StoreMode::Write).unwrap();
        store.record_file(Path::new("/p/a.c"), true).unwrap();
        store.commit().unwrap();

        let mut board = Blackboard::new();
        board.set(keys::CLEAR_TIME, 2.0_f64);
        board.set(keys::INDEX_TIME, 3.0_f64);
        board.set(keys::SOURCE_FILE_COUNT, 1_usize);
        board.set(keys::INDEXED_SOURCE_FILE_COUNT, 1_usize);

        let decider: Arc<Mutex<dyn PolicyDecider>> =
            Arc::new(Mutex::new(|_: &IndexingReport| DatabasePolicy::Refresh));
        let slot = ReportSlot::default();
        let log = LogContext::disabled();
        {
            let mut ctx = TaskContext::new(&mut board, &mut store, &log, CancellationToken::new());
            let mut node = TaskNode::new(FinishRun::new(decider, Arc::clone(&slot)));
            assert_eq!(node.tick(&mut ctx), TaskState::Success);
        }

        assert_eq!(store.mode(), StoreMode::Read);
        assert_eq!(board.get::<bool>(keys::REFRESH_DATABASE), Some(true));

        let report = slot.lock().unwrap().clone().unwrap();
        assert_eq!(report.file_count, 1);
        assert_eq!(report.policy, Some(DatabasePolicy::Refresh));
        assert!(report.duration >= Duration::from_secs(5));
    }
}
