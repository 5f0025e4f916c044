use super::release_store;
use crate::blackboard::keys;
use crate::error::Result;
use crate::events::PipelineEvent;
use crate::task::{Task, TaskContext, TaskState};
use srcgraph_store::StoreMode;
use std::path::PathBuf;
use std::time::Instant;

/// Removes everything stale files contributed, a batch per tick.
///
/// Leaves the store in write mode with everything committed, ready for indexing.
pub struct ClearStaleEntries {
    files: Vec<PathBuf>,
    clear_all: bool,
    batch_size: usize,
    position: usize,
    removed: usize,
    started: Option<Instant>,
}

impl ClearStaleEntries {
    #[must_use]
    pub fn new(files: Vec<PathBuf>, batch_size: usize) -> Self {
        Self {
            files,
            clear_all: false,
            batch_size: batch_size.max(1),
            position: 0,
            removed: 0,
            started: None,
        }
    }

    /// Drop the whole store content up front instead of clearing file by file.
    #[must_use]
    pub fn clearing_everything(mut self) -> Self {
        self.clear_all = true;
        self
    }
}

impl Task for ClearStaleEntries {
    fn name(&self) -> &str {
        "clear-stale-entries"
    }

    fn enter(&mut self, ctx: &mut TaskContext<'_>) -> Result<()> {
        ctx.emit(PipelineEvent::StageStarted {
            stage: self.name().to_string(),
        });
        self.started = Some(Instant::now());
        ctx.store.set_mode(StoreMode::Write)?;

        if self.clear_all {
            ctx.store.clear_all()?;
            self.removed = self.files.len();
            self.position = self.files.len();
            ctx.log.info("Cleared the whole symbol store");
        } else if !self.files.is_empty() {
            ctx.log.info(format!("Clearing {} files", self.files.len()));
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskState> {
        if self.position >= self.files.len() {
            return Ok(TaskState::Success);
        }

        let end = (self.position + self.batch_size).min(self.files.len());
        self.removed += ctx.store.clear_files(&self.files[self.position..end])?;
        self.position = end;
        ctx.emit(PipelineEvent::ClearProgress {
            cleared: self.position,
            total: self.files.len(),
        });

        if self.position >= self.files.len() {
            Ok(TaskState::Success)
        } else {
            Ok(TaskState::Running)
        }
    }

    fn exit(&mut self, ctx: &mut TaskContext<'_>) -> Result<()> {
        ctx.store.commit()?;
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
        ctx.blackboard.set(keys::CLEAR_TIME, elapsed.as_secs_f64());
        ctx.log.debug(format!(
            "Cleared {} file records in {:.3}s",
            self.removed,
            elapsed.as_secs_f64()
        ));
        Ok(())
    }

    fn reset(&mut self) {
        self.position = 0;
        self.removed = 0;
        self.started = None;
    }

    fn terminate(&mut self, ctx: &mut TaskContext<'_>) {
        release_store(ctx.store);
    }
}
