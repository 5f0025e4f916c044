use crate::blackboard::{keys, Blackboard};
use crate::error::Result;
use serde::{Serialize, Serializer};
use srcgraph_store::{ErrorCountInfo, PersistentSymbolStore};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// What happens to the store written by a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabasePolicy {
    Keep,
    Discard,
    /// Keep, then plan another run right away.
    Refresh,
}

impl DatabasePolicy {
    pub fn write_to(self, board: &mut Blackboard) {
        match self {
            Self::Keep => board.set(keys::KEEP_DATABASE, true),
            Self::Discard => board.set(keys::DISCARD_DATABASE, true),
            Self::Refresh => {
                board.set(keys::KEEP_DATABASE, true);
                board.set(keys::REFRESH_DATABASE, true);
            }
        }
    }

    #[must_use]
    pub fn read_from(board: &Blackboard) -> Option<Self> {
        if board.get_or(keys::DISCARD_DATABASE, false) {
            Some(Self::Discard)
        } else if board.get_or(keys::REFRESH_DATABASE, false) {
            Some(Self::Refresh)
        } else if board.get_or(keys::KEEP_DATABASE, false) {
            Some(Self::Keep)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn keeps_store(self) -> bool {
        matches!(self, Self::Keep | Self::Refresh)
    }
}

impl fmt::Display for DatabasePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => f.write_str("keep"),
            Self::Discard => f.write_str("discard"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    Success { errors: u64 },
    SuccessWithFatalErrors { errors: u64, fatal: u64 },
    Interrupted,
    Aborted { reason: String },
}

impl RunOutcome {
    #[must_use]
    pub const fn from_errors(errors: ErrorCountInfo) -> Self {
        if errors.fatal > 0 {
            Self::SuccessWithFatalErrors {
                errors: errors.total,
                fatal: errors.fatal,
            }
        } else {
            Self::Success {
                errors: errors.total,
            }
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::SuccessWithFatalErrors { .. })
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexingReport {
    pub indexed_source_file_count: usize,
    pub source_file_count: usize,
    pub completed_file_count: u64,
    pub file_count: u64,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub errors: ErrorCountInfo,
    pub interrupted: bool,
    pub shallow: bool,
    pub policy: Option<DatabasePolicy>,
    pub outcome: RunOutcome,
}

fn serialize_secs<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl IndexingReport {
    /// Aggregate the run counters from the blackboard and the store, which must be in read
    /// mode. `outcome` overrides the outcome derived from the error counts.
    pub fn collect(
        board: &Blackboard,
        store: &PersistentSymbolStore,
        duration: Duration,
        outcome: Option<RunOutcome>,
    ) -> Result<Self> {
        let errors = store.get_error_count()?;
        let stats = store.get_storage_stats()?;
        let interrupted = board.get_or(keys::INTERRUPTED_INDEXING, false);

        let outcome = outcome.unwrap_or_else(|| {
            if interrupted {
                RunOutcome::Interrupted
            } else {
                RunOutcome::from_errors(errors)
            }
        });

        Ok(Self {
            indexed_source_file_count: board.get_or(keys::INDEXED_SOURCE_FILE_COUNT, 0_usize),
            source_file_count: board.get_or(keys::SOURCE_FILE_COUNT, 0_usize),
            completed_file_count: stats.completed_file_count,
            file_count: stats.file_count,
            duration,
            errors,
            interrupted,
            shallow: board.get_or(keys::SHALLOW_INDEXING, false),
            policy: DatabasePolicy::read_from(board),
            outcome,
        })
    }

    #[must_use]
    pub fn status_line(&self) -> String {
        let mut line = format!(
            "Finished indexing: {}/{} source files indexed; {}; {} errors",
            self.indexed_source_file_count,
            self.source_file_count,
            format_duration(self.duration),
            self.errors.total
        );
        if self.errors.fatal > 0 {
            line.push_str(&format!(" ({} fatal errors)", self.errors.fatal));
        }
        line
    }
}

/// `hh:mm:ss`; hours are not wrapped.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Decides the fate of the store once a run is over.
pub trait PolicyDecider: Send {
    fn decide(&mut self, report: &IndexingReport) -> DatabasePolicy;
}

impl<F> PolicyDecider for F
where
    F: FnMut(&IndexingReport) -> DatabasePolicy + Send,
{
    fn decide(&mut self, report: &IndexingReport) -> DatabasePolicy {
        self(report)
    }
}

/// Non-interactive decider: complete runs are kept, aborted runs discarded, interrupted
/// runs kept or discarded by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoPolicy {
    pub keep_interrupted: bool,
}

impl PolicyDecider for AutoPolicy {
    fn decide(&mut self, report: &IndexingReport) -> DatabasePolicy {
        match report.outcome {
            RunOutcome::Success { .. } | RunOutcome::SuccessWithFatalErrors { .. } => {
                DatabasePolicy::Keep
            }
            RunOutcome::Interrupted if self.keep_interrupted => DatabasePolicy::Keep,
            RunOutcome::Interrupted | RunOutcome::Aborted { .. } => DatabasePolicy::Discard,
        }
    }
}

pub type SharedDecider = Arc<Mutex<dyn PolicyDecider>>;

/// Where the finish stage leaves its report for the pipeline.
pub type ReportSlot = Arc<Mutex<Option<IndexingReport>>>;

/// Lock ignoring poisoning; the guarded values stay consistent across a panicking holder.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
