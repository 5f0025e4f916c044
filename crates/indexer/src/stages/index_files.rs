use super::release_store;
use crate::blackboard::keys;
use crate::error::{IndexerError, Result};
use crate::events::PipelineEvent;
use crate::fingerprint::FingerprintStrategy;
use crate::parser::{collect_unit, SourceParser};
use crate::report::lock;
use crate::task::{Task, TaskContext, TaskState};
use srcgraph_store::{
    CollectedUnit, ErrorRecord, Fingerprint, ParseLocation, ParserClient, PersistentSymbolStore,
    StoreMode,
};
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

/// Result of parsing one source file, produced off the pipeline thread.
struct ParsedFile {
    path: PathBuf,
    /// Taken before parsing so that edits made during the run are picked up next time.
    fingerprint: Option<Fingerprint>,
    unit: CollectedUnit,
}

fn parse_file(
    parser: &dyn SourceParser,
    strategy: FingerprintStrategy,
    path: PathBuf,
) -> ParsedFile {
    let fingerprint = strategy.compute(&path).ok();
    let unit = collect_unit(parser, &path);
    ParsedFile {
        path,
        fingerprint,
        unit,
    }
}

struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    results: UnboundedReceiver<ParsedFile>,
    cancel: CancellationToken,
}

impl WorkerPool {
    fn spawn(
        count: usize,
        files: &[PathBuf],
        parser: &Arc<dyn SourceParser>,
        strategy: FingerprintStrategy,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let queue = Arc::new(Mutex::new(files.iter().cloned().collect::<VecDeque<_>>()));
        let (sender, results) = mpsc::unbounded_channel();

        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let queue = Arc::clone(&queue);
            let parser = Arc::clone(parser);
            let sender = sender.clone();
            let cancel = cancel.clone();
            let handle = thread::Builder::new()
                .name(format!("srcgraph-parser-{index}"))
                .spawn(move || loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(path) = lock(&*queue).pop_front() else {
                        break;
                    };
                    let parsed = parse_file(parser.as_ref(), strategy, path);
                    if sender.send(parsed).is_err() {
                        break;
                    }
                })?;
            handles.push(handle);
        }

        Ok(Self {
            handles,
            results,
            cancel,
        })
    }

    fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if handle.join().is_err() {
                log::error!("A parser worker panicked");
            }
        }
    }
}

/// Parses the files of the run and funnels the results into the store.
///
/// With no workers one file is parsed inline per tick. Otherwise worker threads parse into
/// private collectors and this task, as the only writer, applies their units in arrival
/// order. A file counts as indexed when its unit carries no fatal error.
pub struct IndexFiles {
    files: Vec<PathBuf>,
    run_set: BTreeSet<PathBuf>,
    parser: Arc<dyn SourceParser>,
    strategy: FingerprintStrategy,
    worker_count: usize,
    inline_queue: VecDeque<PathBuf>,
    workers: Option<WorkerPool>,
    applied: BTreeSet<PathBuf>,
    started: Option<Instant>,
}

impl IndexFiles {
    pub fn new(
        files: Vec<PathBuf>,
        parser: Arc<dyn SourceParser>,
        strategy: FingerprintStrategy,
        worker_count: usize,
    ) -> Self {
        Self {
            run_set: files.iter().cloned().collect(),
            files,
            parser,
            strategy,
            worker_count,
            inline_queue: VecDeque::new(),
            workers: None,
            applied: BTreeSet::new(),
            started: None,
        }
    }

    fn is_done(&self) -> bool {
        self.applied.len() >= self.files.len()
    }

    fn apply(&mut self, ctx: &mut TaskContext<'_>, parsed: ParsedFile) -> Result<()> {
        let ParsedFile {
            path,
            fingerprint,
            unit,
        } = parsed;

        let mut has_fatal = unit.has_fatal_error();
        let touched: Vec<PathBuf> = unit
            .files
            .iter()
            .map(|(p, _)| p)
            .filter(|p| **p != path && !self.run_set.contains(*p))
            .cloned()
            .collect();

        match ctx.store.apply_unit(unit) {
            Ok(applied) => {
                if applied.error_count > 0 {
                    ctx.log.debug(format!(
                        "{}: {} errors ({} fatal)",
                        path.display(),
                        applied.error_count,
                        applied.fatal_error_count
                    ));
                }
            }
            Err(err) if ctx.store.mode() == StoreMode::Write => {
                ctx.log
                    .warn(format!("Rejected parse results for {}: {err}", path.display()));
                record_rejected_unit(ctx.store, &path, &err.to_string())?;
                has_fatal = true;
            }
            Err(err) => return Err(err.into()),
        }

        ctx.store.mark_file(&path, fingerprint, !has_fatal)?;
        for other in &touched {
            ctx.store
                .mark_file(other, self.strategy.compute(other).ok(), !has_fatal)?;
        }

        self.applied.insert(path.clone());
        ctx.emit(PipelineEvent::IndexProgress {
            indexed: self.applied.len(),
            total: self.files.len(),
            file: path,
        });
        Ok(())
    }

    fn update_inline(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskState> {
        if let Some(path) = self.inline_queue.pop_front() {
            let parsed = parse_file(self.parser.as_ref(), self.strategy, path);
            self.apply(ctx, parsed)?;
        }
        Ok(if self.inline_queue.is_empty() {
            TaskState::Success
        } else {
            TaskState::Running
        })
    }

    fn update_workers(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskState> {
        let mut received = 0_usize;
        loop {
            if ctx.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }
            let Some(pool) = self.workers.as_mut() else {
                break;
            };
            match pool.results.try_recv() {
                Ok(parsed) => {
                    self.apply(ctx, parsed)?;
                    received += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.is_done() {
                        break;
                    }
                    return Err(IndexerError::Other(format!(
                        "parser workers stopped with {} files left",
                        self.files.len() - self.applied.len()
                    )));
                }
            }
        }

        if self.is_done() {
            return Ok(TaskState::Success);
        }
        if received == 0 {
            ctx.set_idle();
        }
        Ok(TaskState::Running)
    }

    fn record_counts(&self, ctx: &mut TaskContext<'_>) {
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
        ctx.blackboard.set(keys::INDEX_TIME, elapsed.as_secs_f64());
        ctx.blackboard.set(keys::INDEXED_SOURCE_FILE_COUNT, self.applied.len());
        ctx.blackboard.set(keys::SOURCE_FILE_COUNT, self.files.len());
    }

    /// Files that never got their unit applied keep a record with the current fingerprint,
    /// flagged as not indexed, so an incomplete-files refresh picks them up again.
    fn mark_unfinished(&self, ctx: &mut TaskContext<'_>) -> Result<usize> {
        if ctx.store.mode() != StoreMode::Write {
            return Ok(0);
        }
        let unfinished: Vec<&PathBuf> = self
            .files
            .iter()
            .filter(|p| !self.applied.contains(*p))
            .collect();
        for path in &unfinished {
            ctx.store.record_file(path, true)?;
        }
        ctx.store.commit()?;
        for path in &unfinished {
            ctx.store
                .mark_file(path, self.strategy.compute(path).ok(), false)?;
        }
        Ok(unfinished.len())
    }
}

fn record_rejected_unit(
    store: &mut PersistentSymbolStore,
    path: &Path,
    reason: &str,
) -> Result<()> {
    let file = store.record_file(path, true)?;
    store.record_error(ErrorRecord {
        message: format!("cannot store parse results: {reason}"),
        is_fatal: true,
        is_indexed_file: true,
        source_file: path.to_path_buf(),
        location: ParseLocation::file_start(file),
    })?;
    store.commit()?;
    Ok(())
}

impl Task for IndexFiles {
    fn name(&self) -> &str {
        "index-files"
    }

    fn enter(&mut self, ctx: &mut TaskContext<'_>) -> Result<()> {
        ctx.emit(PipelineEvent::StageStarted {
            stage: self.name().to_string(),
        });
        self.started = Some(Instant::now());
        ctx.blackboard.set(keys::SOURCE_FILE_COUNT, self.files.len());
        ctx.store.set_mode(StoreMode::Write)?;

        let workers = self.worker_count.min(self.files.len());
        ctx.log.info(format!(
            "Indexing {} source files ({})",
            self.files.len(),
            if workers == 0 {
                "inline".to_string()
            } else {
                format!("{workers} workers")
            }
        ));

        if workers == 0 {
            self.inline_queue = self.files.iter().cloned().collect();
        } else {
            self.workers = Some(WorkerPool::spawn(
                workers,
                &self.files,
                &self.parser,
                self.strategy,
                ctx.cancel_token().child_token(),
            )?);
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskState> {
        if self.files.is_empty() {
            return Ok(TaskState::Success);
        }
        if self.workers.is_some() {
            self.update_workers(ctx)
        } else {
            self.update_inline(ctx)
        }
    }

    fn exit(&mut self, ctx: &mut TaskContext<'_>) -> Result<()> {
        if let Some(pool) = self.workers.take() {
            pool.shutdown();
        }
        ctx.store.commit()?;
        self.record_counts(ctx);
        ctx.log.info(format!(
            "Indexed {}/{} source files",
            self.applied.len(),
            self.files.len()
        ));
        Ok(())
    }

    fn reset(&mut self) {
        if let Some(pool) = self.workers.take() {
            pool.shutdown();
        }
        self.inline_queue.clear();
        self.applied.clear();
        self.started = None;
    }

    fn terminate(&mut self, ctx: &mut TaskContext<'_>) {
        if let Some(pool) = self.workers.take() {
            pool.shutdown();
        }

        match self.mark_unfinished(ctx) {
            Ok(0) => {}
            Ok(count) => ctx.log.info(format!("{count} files left unindexed")),
            Err(err) => ctx
                .log
                .error(format!("Could not record unindexed files: {err}")),
        }

        self.record_counts(ctx);
        ctx.blackboard.set(keys::INTERRUPTED_INDEXING, true);
        release_store(ctx.store);
    }
}
