use super::resolve_mode;
use crate::command::domain::{CommandOutcome, HintKind};
use crate::command::{CommandContext, IndexRequest};
use anyhow::{Context, Result};
use serde::Serialize;
use srcgraph_indexer::{
    apply_database_policy, AutoPolicy, Blackboard, DatabasePolicy, IndexingPipeline,
    IndexingReport, PipelineEvent, RefreshSummary, RunOutcome, SharedDecider,
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::mpsc::{self, UnboundedReceiver};

#[derive(Serialize)]
struct IndexOutput {
    summary: RefreshSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<IndexingReport>,
}

pub fn run(ctx: &CommandContext, request: &IndexRequest) -> Result<CommandOutcome> {
    let project = &ctx.project;
    let mut store = project.open_store()?;
    let mode = resolve_mode(&store, request.mode)?;
    let info = project.plan(&store, mode)?;
    let summary = info.summary();

    if summary.clear_count == 0 && summary.index_count == 0 {
        return Ok(CommandOutcome::from_value(IndexOutput {
            summary,
            report: None,
        })?
        .with_line("Nothing to refresh.")
        .with_hint(HintKind::Info, "The store is up to date."));
    }

    if !request.assume_yes && !confirm(&summary)? {
        return Ok(CommandOutcome::from_value(IndexOutput {
            summary,
            report: None,
        })?
        .with_line("Refresh declined."));
    }

    let mut options = project.pipeline_options(&info);
    if let Some(workers) = request.workers {
        options.worker_count = workers;
    }
    let decider: SharedDecider = Arc::new(Mutex::new(AutoPolicy {
        keep_interrupted: project.config().indexing.keep_interrupted
            && !request.discard_interrupted,
    }));

    let (events, receiver) = mpsc::unbounded_channel();
    let progress = thread::Builder::new()
        .name("srcgraph-progress".to_string())
        .spawn(move || log_progress(receiver))
        .context("Failed to start the progress reporter")?;

    let mut pipeline = IndexingPipeline::new(options, Arc::new(project.parser()), decider)
        .with_events(events)
        .with_cancel_token(ctx.cancel.clone());
    let report = pipeline.run(&info, &mut store, &mut Blackboard::new());
    drop(pipeline);
    if progress.join().is_err() {
        log::warn!("Progress reporter panicked");
    }
    let report = report?;

    let policy = report.policy.unwrap_or(DatabasePolicy::Discard);
    apply_database_policy(&mut store, policy)?;

    let mut outcome = CommandOutcome::from_value(IndexOutput {
        summary,
        report: Some(report.clone()),
    })?
    .with_line(summary.to_string())
    .with_line(report.status_line());
    outcome.meta.store_updated = Some(policy.keeps_store());
    outcome = outcome.with_line(if policy.keeps_store() {
        "Kept the refreshed symbol store."
    } else {
        "Discarded the refreshed symbol store."
    });

    match &report.outcome {
        RunOutcome::Success { .. } => {}
        RunOutcome::SuccessWithFatalErrors { fatal, .. } => {
            outcome = outcome.with_hint(
                HintKind::Warn,
                format!(
                    "{fatal} fatal errors; run `srcgraph index --mode incomplete` after fixing them."
                ),
            );
        }
        RunOutcome::Interrupted => {
            outcome.failure = Some("Indexing was interrupted".to_string());
            if policy.keeps_store() {
                outcome = outcome.with_hint(
                    HintKind::Action,
                    "Run `srcgraph index --mode incomplete` to finish the remaining files.",
                );
            }
        }
        RunOutcome::Aborted { reason } => {
            outcome.failure = Some(format!("Indexing aborted: {reason}"));
        }
    }
    Ok(outcome)
}

/// Ask on the terminal; without one the refresh proceeds.
fn confirm(summary: &RefreshSummary) -> Result<bool> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        log::info!("No terminal attached, proceeding without confirmation");
        return Ok(true);
    }
    eprint!("{summary}. Proceed? [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn log_progress(mut receiver: UnboundedReceiver<PipelineEvent>) {
    let mut last_decile = 0;
    while let Some(event) = receiver.blocking_recv() {
        match event {
            PipelineEvent::StageStarted { stage } => log::debug!("Stage {stage} started"),
            PipelineEvent::IndexProgress {
                indexed,
                total,
                file,
            } => {
                log::debug!("[{indexed}/{total}] {}", file.display());
                let decile = indexed * 10 / total.max(1);
                if decile > last_decile {
                    last_decile = decile;
                    log::info!("Indexed {indexed} of {total} files");
                }
            }
            PipelineEvent::ClearProgress { cleared, total } => {
                log::debug!("Cleared {cleared} of {total} files");
            }
            PipelineEvent::IncludeValidationProgress { fraction } => {
                log::debug!("Include validation {:.0}%", fraction * 100.0);
            }
            PipelineEvent::IncludeValidation { unresolved } => {
                if !unresolved.is_empty() {
                    log::warn!("{} include directives could not be resolved", unresolved.len());
                }
            }
            PipelineEvent::Finished(_) => {}
        }
    }
}
