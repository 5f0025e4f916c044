//! # srcgraph indexer
//!
//! Refresh planning and the cooperative indexing pipeline.
//!
//! ## Pipeline
//!
//! ```text
//! srcgraph.toml ──> Project
//!     │
//!     ├──> FileScanner (.gitignore aware) ──> SourceSnapshot (fingerprints)
//!     │                                            │
//!     ├──> plan_refresh(mode, file records) <──────┘
//!     │      └─> RefreshInfo { files_to_clear, files_to_index }
//!     │
//!     └──> IndexingPipeline (one thread, ticked task tree)
//!            ├─> ValidateIncludes   (optional, background scan)
//!            ├─> ClearStaleEntries  (store: write)
//!            ├─> IndexFiles         (workers ──channel──> apply_unit)
//!            └─> FinishRun          (store: read, compact, report, policy)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use srcgraph_indexer::{
//!     apply_database_policy, AutoPolicy, Blackboard, IndexerConfig, IndexingPipeline, Project,
//!     RefreshMode,
//! };
//! use std::sync::{Arc, Mutex};
//!
//! fn main() -> srcgraph_indexer::Result<()> {
//!     let project = Project::new("/path/to/project", IndexerConfig::default())?;
//!     let mut store = project.open_store()?;
//!     let info = project.plan(&store, RefreshMode::UpdatedFiles)?;
//!
//!     let decider = Arc::new(Mutex::new(AutoPolicy { keep_interrupted: true }));
//!     let mut pipeline = IndexingPipeline::new(
//!         project.pipeline_options(&info),
//!         Arc::new(project.parser()),
//!         decider,
//!     );
//!     let report = pipeline.run(&info, &mut store, &mut Blackboard::new())?;
//!     println!("{}", report.status_line());
//!
//!     if let Some(policy) = report.policy {
//!         apply_database_policy(&mut store, policy)?;
//!     }
//!     Ok(())
//! }
//! ```

mod blackboard;
mod config;
mod error;
mod events;
mod fingerprint;
mod parser;
mod pipeline;
mod planner;
mod project;
mod report;
mod scanner;
mod snapshot;
mod source_group;
mod stages;
pub mod task;

pub use blackboard::{keys, Blackboard, BlackboardType, BlackboardValue};
pub use config::{
    resolve_path, IndexerConfig, IndexingSection, LockSection, StoreSection, CONFIG_FILE_NAME,
};
pub use error::{IndexerError, Result};
pub use events::PipelineEvent;
pub use fingerprint::FingerprintStrategy;
pub use parser::{collect_unit, IncludeGraphParser, ParseFailure, SourceParser};
pub use pipeline::{apply_database_policy, IncludeValidation, IndexingPipeline, PipelineOptions};
pub use planner::{plan_refresh, RefreshInfo, RefreshMode, RefreshSummary};
pub use project::Project;
pub use report::{
    format_duration, AutoPolicy, DatabasePolicy, IndexingReport, PolicyDecider, ReportSlot,
    RunOutcome, SharedDecider,
};
pub use scanner::FileScanner;
pub use snapshot::SourceSnapshot;
pub use source_group::{
    CustomSourceGroup, CxxSourceGroup, JavaSourceGroup, PythonSourceGroup, SourceGroup,
    SourceGroupCapabilities,
};
pub use srcgraph_includes::LogContext;
pub use stages::{
    ClearStaleEntries, FinishRun, IncludeValidationRequest, IndexFiles, ValidateIncludes,
};
