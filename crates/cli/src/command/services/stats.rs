use crate::command::domain::{CommandOutcome, HintKind};
use crate::command::CommandContext;
use anyhow::Result;
use serde::Serialize;
use srcgraph_store::{ErrorCountInfo, StorageStats};
use std::path::PathBuf;

/// Errors listed in text mode before the rest is summarized.
const SHOWN_ERRORS: usize = 20;

#[derive(Serialize)]
struct StatsOutput {
    storage: StorageStats,
    errors: ErrorCountInfo,
    error_messages: Vec<ErrorLine>,
}

#[derive(Serialize)]
struct ErrorLine {
    source_file: PathBuf,
    line: u32,
    fatal: bool,
    message: String,
}

pub fn run(ctx: &CommandContext) -> Result<CommandOutcome> {
    let store = ctx.project.open_store()?;
    let storage = store.get_storage_stats()?;
    let errors = store.get_error_count()?;
    let error_messages: Vec<ErrorLine> = store
        .errors()?
        .iter()
        .map(|e| ErrorLine {
            source_file: e.source_file.clone(),
            line: e.location.line,
            fatal: e.is_fatal,
            message: e.message.clone(),
        })
        .collect();

    let mut lines = vec![
        format!(
            "files: {} ({} complete)",
            storage.file_count, storage.completed_file_count
        ),
        format!("nodes: {}", storage.node_count),
        format!("edges: {}", storage.edge_count),
        format!("errors: {} ({} fatal)", errors.total, errors.fatal),
    ];
    for error in error_messages.iter().take(SHOWN_ERRORS) {
        let severity = if error.fatal { "fatal" } else { "error" };
        lines.push(format!(
            "  {}:{}: {severity}: {}",
            error.source_file.display(),
            error.line,
            error.message
        ));
    }
    if error_messages.len() > SHOWN_ERRORS {
        lines.push(format!(
            "  ... {} more (use --json for all)",
            error_messages.len() - SHOWN_ERRORS
        ));
    }

    let mut outcome = CommandOutcome::from_value(StatsOutput {
        storage,
        errors,
        error_messages,
    })?;
    for line in lines {
        outcome = outcome.with_line(line);
    }
    if storage.file_count == 0 {
        outcome = outcome.with_hint(
            HintKind::Action,
            "The store is empty; run `srcgraph index` to build it.",
        );
    }
    Ok(outcome)
}
