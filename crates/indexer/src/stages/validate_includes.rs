use crate::blackboard::keys;
use crate::error::{IndexerError, Result};
use crate::events::PipelineEvent;
use crate::task::{Task, TaskContext, TaskState};
use srcgraph_includes::{
    get_unresolved_include_directives, progress_granularity, IncludeDirective,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Inputs of an include scan, fixed when the run is planned.
#[derive(Debug, Clone, Default)]
pub struct IncludeValidationRequest {
    pub source_files: Vec<PathBuf>,
    /// Headers under these roots are scanned too.
    pub indexed_paths: BTreeSet<PathBuf>,
    pub search_paths: Vec<PathBuf>,
}

/// Pre-flight scan for `#include` directives that resolve nowhere.
///
/// The scan runs on its own thread; the task only polls it. Terminating the task stops the
/// scan before its next source file and waits for the thread, so no progress event is sent
/// after the task has ended.
pub struct ValidateIncludes {
    request: Arc<IncludeValidationRequest>,
    fail_on_unresolved: bool,
    scan: Option<IncludeScan>,
}

struct IncludeScan {
    handle: JoinHandle<Vec<IncludeDirective>>,
    stop: CancellationToken,
}

impl ValidateIncludes {
    #[must_use]
    pub fn new(request: IncludeValidationRequest, fail_on_unresolved: bool) -> Self {
        Self {
            request: Arc::new(request),
            fail_on_unresolved,
            scan: None,
        }
    }

    fn finish(
        &self,
        ctx: &mut TaskContext<'_>,
        unresolved: Vec<IncludeDirective>,
    ) -> Result<TaskState> {
        ctx.blackboard.set(keys::UNRESOLVED_INCLUDE_COUNT, unresolved.len());
        ctx.blackboard.set(keys::INCLUDE_VALIDATION_DONE, true);

        for directive in &unresolved {
            ctx.log.warn(format!(
                "Unresolved include in {}:{}: {}",
                directive.including_file.display(),
                directive.line_number,
                directive.raw_text.trim()
            ));
        }
        ctx.log.info(format!(
            "Include validation finished: {} unresolved directives",
            unresolved.len()
        ));

        let count = unresolved.len();
        ctx.emit(PipelineEvent::IncludeValidation { unresolved });

        if self.fail_on_unresolved && count > 0 {
            return Err(IndexerError::UnresolvedIncludes(count));
        }
        Ok(TaskState::Success)
    }
}

impl Task for ValidateIncludes {
    fn name(&self) -> &str {
        "validate-includes"
    }

    fn enter(&mut self, ctx: &mut TaskContext<'_>) -> Result<()> {
        ctx.emit(PipelineEvent::StageStarted {
            stage: self.name().to_string(),
        });
        ctx.log.info(format!(
            "Validating includes of {} source files",
            self.request.source_files.len()
        ));

        let request = Arc::clone(&self.request);
        let log = ctx.log.clone();
        let events = ctx.event_sender();
        let stop = ctx.cancel_token().child_token();
        let scan_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("srcgraph-include-scan".to_string())
            .spawn(move || {
                let mut on_progress = |fraction: f32| {
                    if let Some(events) = &events {
                        // Nobody listening is fine.
                        let _ = events.send(PipelineEvent::IncludeValidationProgress { fraction });
                    }
                };
                get_unresolved_include_directives(
                    &request.source_files,
                    &request.indexed_paths,
                    &request.search_paths,
                    progress_granularity(request.source_files.len()),
                    &log,
                    &|| scan_stop.is_cancelled(),
                    &mut on_progress,
                )
            })?;
        self.scan = Some(IncludeScan { handle, stop });
        Ok(())
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskState> {
        let finished = self
            .scan
            .as_ref()
            .map_or(true, |scan| scan.handle.is_finished());
        if !finished {
            ctx.set_idle();
            return Ok(TaskState::Running);
        }

        let unresolved = match self.scan.take() {
            Some(scan) => scan
                .handle
                .join()
                .map_err(|_| IndexerError::Other("include scan thread panicked".to_string()))?,
            None => Vec::new(),
        };
        self.finish(ctx, unresolved)
    }

    fn reset(&mut self) {
        if let Some(scan) = self.scan.take() {
            scan.stop.cancel();
            let _ = scan.handle.join();
        }
    }

    fn terminate(&mut self, ctx: &mut TaskContext<'_>) {
        let Some(scan) = self.scan.take() else {
            return;
        };
        scan.stop.cancel();
        if scan.handle.join().is_err() {
            ctx.log.warn("Include scan thread panicked while stopping");
        } else {
            ctx.log.debug("Include scan stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::Blackboard;
    use crate::task::{TaskNode, TaskScheduler};
    use srcgraph_includes::LogContext;
    use srcgraph_store::PersistentSymbolStore;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc::error::TryRecvError;

    fn project() -> (TempDir, IncludeValidationRequest) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("a.c"), "#include \"missing.h\"\n#include \"b.h\"\n").unwrap();
        fs::write(root.join("b.h"), "").unwrap();
        let request = IncludeValidationRequest {
            source_files: vec![root.join("a.c")],
            indexed_paths: BTreeSet::from([root.clone()]),
            search_paths: Vec::new(),
        };
        (dir, request)
    }

    #[test]
    fn counts_unresolved_directives() {
        let (_dir, request) = project();
        let (mut board, mut store, log) =
            (Blackboard::new(), PersistentSymbolStore::in_memory(), LogContext::disabled());
        let mut ctx = TaskContext::new(&mut board, &mut store, &log, CancellationToken::new());

        let mut node = TaskNode::new(ValidateIncludes::new(request, false));
        let state = TaskScheduler::new(Duration::from_millis(1)).run(&mut node, &mut ctx);

        assert_eq!(state, TaskState::Success);
        assert_eq!(board.get::<usize>(keys::UNRESOLVED_INCLUDE_COUNT), Some(1));
        assert_eq!(board.get::<bool>(keys::INCLUDE_VALIDATION_DONE), Some(true));
    }

    #[test]
    fn cancellation_stops_the_scan_and_releases_its_event_sender() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let source_files: Vec<PathBuf> = (0..500)
            .map(|i| {
                let path = root.join(format!("f{i}.c"));
                fs::write(&path, "#include \"gone.h\"\n").unwrap();
                path
            })
            .collect();
        let request = IncludeValidationRequest {
            source_files,
            indexed_paths: BTreeSet::new(),
            search_paths: Vec::new(),
        };

        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let (mut board, mut store, log) =
            (Blackboard::new(), PersistentSymbolStore::in_memory(), LogContext::disabled());
        let mut ctx = TaskContext::new(&mut board, &mut store, &log, cancel.clone())
            .with_events(sender);

        let mut node = TaskNode::new(ValidateIncludes::new(request, true));
        assert_eq!(node.tick(&mut ctx), TaskState::Running);
        cancel.cancel();
        assert_eq!(node.tick(&mut ctx), TaskState::Failure);
        assert!(matches!(ctx.take_failure(), Some(IndexerError::Cancelled)));
        drop(ctx);

        loop {
            match receiver.try_recv() {
                Ok(PipelineEvent::IncludeValidation { .. }) => {
                    panic!("a cancelled scan must not report a result")
                }
                Ok(_) => {}
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => panic!("the scan thread still holds an event sender"),
            }
        }
        assert_eq!(board.get::<bool>(keys::INCLUDE_VALIDATION_DONE), None);
    }

    #[test]
    fn fails_when_configured_to() {
        let (_dir, request) = project();
        let (mut board, mut store, log) =
            (Blackboard::new(), PersistentSymbolStore::in_memory(), LogContext::disabled());
        let mut ctx = TaskContext::new(&mut board, &mut store, &log, CancellationToken::new());

        let mut node = TaskNode::new(ValidateIncludes::new(request, true));
        let state = TaskScheduler::new(Duration::from_millis(1)).run(&mut node, &mut ctx);

        assert_eq!(state, TaskState::Failure);
        assert!(matches!(
            ctx.take_failure(),
            Some(IndexerError::UnresolvedIncludes(1))
        ));
    }
}
