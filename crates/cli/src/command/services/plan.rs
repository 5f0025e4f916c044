use super::resolve_mode;
use crate::command::domain::{CommandOutcome, HintKind};
use crate::command::CommandContext;
use anyhow::Result;
use serde::Serialize;
use srcgraph_indexer::{RefreshInfo, RefreshMode, RefreshSummary};

#[derive(Serialize)]
struct PlanOutput<'a> {
    summary: RefreshSummary,
    available_modes: Vec<RefreshMode>,
    #[serde(flatten)]
    info: &'a RefreshInfo,
}

pub fn run(ctx: &CommandContext, mode: Option<RefreshMode>) -> Result<CommandOutcome> {
    let store = ctx.project.open_store()?;
    let mode = resolve_mode(&store, mode)?;
    let info = ctx.project.plan(&store, mode)?;
    let summary = info.summary();

    let output = PlanOutput {
        summary,
        available_modes: RefreshMode::available_for(store.has_files()?),
        info: &info,
    };
    let mut outcome = CommandOutcome::from_value(&output)?.with_line(summary.to_string());
    for path in &info.files_to_clear {
        outcome = outcome.with_line(format!("  clear  {}", path.display()));
    }
    for path in &info.files_to_index {
        outcome = outcome.with_line(format!("  index  {}", path.display()));
    }

    if summary.clear_count == 0 && summary.index_count == 0 {
        outcome = outcome.with_hint(HintKind::Info, "The store is up to date.");
    } else {
        outcome = outcome.with_hint(
            HintKind::Action,
            format!("Run `srcgraph index --mode {mode}` to apply this plan."),
        );
    }
    Ok(outcome)
}
