use crate::report::IndexingReport;
use srcgraph_includes::IncludeDirective;
use std::path::PathBuf;

/// Progress notifications sent while a pipeline runs.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StageStarted { stage: String },
    /// Fraction in `0.0..=1.0`.
    IncludeValidationProgress { fraction: f32 },
    IncludeValidation { unresolved: Vec<IncludeDirective> },
    ClearProgress { cleared: usize, total: usize },
    IndexProgress {
        indexed: usize,
        total: usize,
        file: PathBuf,
    },
    Finished(Box<IndexingReport>),
}
