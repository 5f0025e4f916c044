use crate::blackboard::{keys, Blackboard};
use crate::config::IndexerConfig;
use crate::error::{IndexerError, Result};
use crate::events::PipelineEvent;
use crate::fingerprint::FingerprintStrategy;
use crate::parser::SourceParser;
use crate::planner::{RefreshInfo, RefreshMode};
use crate::report::{
    lock, DatabasePolicy, IndexingReport, ReportSlot, RunOutcome, SharedDecider,
};
use crate::stages::{
    release_store, ClearStaleEntries, FinishRun, IncludeValidationRequest, IndexFiles,
    ValidateIncludes,
};
use crate::task::{TaskContext, TaskNode, TaskScheduler, TaskSequence, TaskState};
use srcgraph_includes::LogContext;
use srcgraph_store::PersistentSymbolStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct IncludeValidation {
    pub request: IncludeValidationRequest,
    pub fail_on_unresolved: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// 0 parses inline on the pipeline thread.
    pub worker_count: usize,
    pub tick_interval: Duration,
    pub clear_batch_size: usize,
    pub fingerprint: FingerprintStrategy,
    pub shallow: bool,
    pub include_validation: Option<IncludeValidation>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&IndexerConfig::default())
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self {
            worker_count: config.indexing.worker_count,
            tick_interval: config.tick_interval(),
            clear_batch_size: config.indexing.clear_batch_size,
            fingerprint: config.indexing.fingerprint,
            shallow: config.indexing.shallow,
            include_validation: None,
        }
    }

    #[must_use]
    pub fn with_include_validation(
        mut self,
        request: IncludeValidationRequest,
        fail_on_unresolved: bool,
    ) -> Self {
        self.include_validation = Some(IncludeValidation {
            request,
            fail_on_unresolved,
        });
        self
    }
}

/// Runs one refresh: optional include validation, clearing, indexing, finishing.
///
/// `run` blocks the calling thread until the task tree is done; callers on an async runtime
/// move it to a blocking thread. The blackboard is cleared at the start of every run.
pub struct IndexingPipeline {
    options: PipelineOptions,
    parser: Arc<dyn SourceParser>,
    decider: SharedDecider,
    cancel: CancellationToken,
    events: Option<UnboundedSender<PipelineEvent>>,
    log: LogContext,
}

impl IndexingPipeline {
    pub fn new(
        options: PipelineOptions,
        parser: Arc<dyn SourceParser>,
        decider: SharedDecider,
    ) -> Self {
        Self {
            options,
            parser,
            decider,
            cancel: CancellationToken::new(),
            events: None,
            log: LogContext::for_new_run(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: LogContext) -> Self {
        self.log = log;
        self
    }

    /// Cancel runs through an externally owned token, e.g. one wired to Ctrl-C.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels the current or next run. It stays cancelled until [`Self::reset`].
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Make a cancelled pipeline usable again. Previously handed out tokens no longer apply.
    pub fn reset(&mut self) {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }

    fn build_tasks(&self, info: &RefreshInfo, slot: &ReportSlot) -> TaskNode {
        let mut sequence = TaskSequence::new("indexing-run");

        if let Some(validation) = &self.options.include_validation {
            sequence.push(TaskNode::new(ValidateIncludes::new(
                validation.request.clone(),
                validation.fail_on_unresolved,
            )));
        }

        let clear =
            ClearStaleEntries::new(info.files_to_clear.clone(), self.options.clear_batch_size);
        sequence.push(TaskNode::new(if info.mode == RefreshMode::AllFiles {
            clear.clearing_everything()
        } else {
            clear
        }));

        sequence.push(TaskNode::new(IndexFiles::new(
            info.files_to_index.clone(),
            Arc::clone(&self.parser),
            self.options.fingerprint,
            self.options.worker_count,
        )));
        sequence.push(TaskNode::new(FinishRun::new(
            Arc::clone(&self.decider),
            Arc::clone(slot),
        )));

        TaskNode::new(sequence)
    }

    /// Execute `info` against `store`. The store is back in read mode afterwards and the
    /// decided policy is on the blackboard and in the report; acting on it is up to the
    /// caller (see [`apply_database_policy`]).
    ///
    /// Cancellation and stage failures still produce a report, marked interrupted or aborted.
    /// An error is returned only when no report can be built from the store.
    pub fn run(
        &mut self,
        info: &RefreshInfo,
        store: &mut PersistentSymbolStore,
        blackboard: &mut Blackboard,
    ) -> Result<IndexingReport> {
        let started = Instant::now();
        blackboard.clear();
        blackboard.set(keys::SHALLOW_INDEXING, self.options.shallow);
        self.log.info(format!("Starting refresh: {}", info.summary()));

        let slot = ReportSlot::default();
        let mut root = self.build_tasks(info, &slot);
        let scheduler = TaskScheduler::new(self.options.tick_interval);

        let (state, failure) = {
            let mut ctx = TaskContext::new(blackboard, store, &self.log, self.cancel.clone());
            if let Some(events) = &self.events {
                ctx = ctx.with_events(events.clone());
            }
            let state = scheduler.run(&mut root, &mut ctx);
            (state, ctx.take_failure())
        };

        let finished = lock(&*slot).take();
        match state {
            TaskState::Success => finished
                .ok_or_else(|| IndexerError::Other("run finished without a report".to_string())),
            TaskState::Running | TaskState::Failure => {
                let failure = failure
                    .unwrap_or_else(|| IndexerError::Other("run failed without a cause".into()));
                self.recover(store, blackboard, failure, started.elapsed())
            }
        }
    }

    fn recover(
        &self,
        store: &mut PersistentSymbolStore,
        blackboard: &mut Blackboard,
        failure: IndexerError,
        duration: Duration,
    ) -> Result<IndexingReport> {
        release_store(store);
        blackboard.set(keys::INTERRUPTED_INDEXING, true);

        let outcome = if failure.is_cancelled() {
            self.log.warn("Indexing was interrupted");
            RunOutcome::Interrupted
        } else {
            self.log.error(format!("Indexing aborted: {failure}"));
            RunOutcome::Aborted {
                reason: failure.to_string(),
            }
        };

        let collected = IndexingReport::collect(blackboard, store, duration, Some(outcome));
        let mut report = match collected {
            Ok(report) => report,
            Err(err) => {
                self.log.error(format!("Cannot summarize the failed run: {err}"));
                return Err(failure);
            }
        };

        let policy = lock(&*self.decider).decide(&report);
        policy.write_to(blackboard);
        report.policy = Some(policy);
        self.log.info(report.status_line());

        if let Some(events) = &self.events {
            // Nobody listening is fine; the report is returned either way.
            let _ = events.send(PipelineEvent::Finished(Box::new(report.clone())));
        }
        Ok(report)
    }
}

/// Keep or discard what the last run wrote.
pub fn apply_database_policy(
    store: &mut PersistentSymbolStore,
    policy: DatabasePolicy,
) -> Result<()> {
    if policy.keeps_store() {
        store.keep()?;
        log::info!("Kept the refreshed symbol store");
    } else {
        store.discard()?;
        log::info!("Discarded the refreshed symbol store");
    }
    Ok(())
}
