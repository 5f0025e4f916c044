use crate::command::domain::{CommandOutcome, HintKind};
use crate::command::CommandContext;
use anyhow::Result;
use serde::Serialize;
use srcgraph_includes::{
    get_header_search_directories, get_unresolved_include_directives, progress_granularity,
    IncludeDirective,
};
use srcgraph_indexer::{resolve_path, LogContext};
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct UnresolvedInclude {
    file: PathBuf,
    line: u32,
    include: String,
    quoted: bool,
}

impl From<IncludeDirective> for UnresolvedInclude {
    fn from(directive: IncludeDirective) -> Self {
        Self {
            file: directive.including_file,
            line: directive.line_number,
            include: directive.include_target,
            quoted: directive.uses_quotes,
        }
    }
}

#[derive(Serialize)]
struct ValidationOutput {
    scanned_files: usize,
    unresolved: Vec<UnresolvedInclude>,
}

#[derive(Serialize)]
struct SearchPathOutput {
    roots: Vec<PathBuf>,
    search_paths: Vec<PathBuf>,
}

fn report_progress(label: &'static str) -> impl FnMut(f32) {
    move |fraction| log::info!("{label}: {:.0}%", fraction * 100.0)
}

pub fn validate(ctx: &CommandContext) -> Result<CommandOutcome> {
    let project = &ctx.project;
    let sources = project.scan_sources()?;
    let request = project.include_validation_request(sources);
    let log = LogContext::for_new_run();

    let unresolved = get_unresolved_include_directives(
        &request.source_files,
        &request.indexed_paths,
        &request.search_paths,
        progress_granularity(request.source_files.len()),
        &log,
        &|| ctx.cancel.is_cancelled(),
        &mut report_progress("Validating includes"),
    );
    if ctx.cancel.is_cancelled() {
        anyhow::bail!("Include validation was interrupted");
    }

    let root = project.root();
    let lines: Vec<String> = unresolved
        .iter()
        .map(|d| {
            format!(
                "{}:{}: {}",
                display_relative(root, &d.including_file),
                d.line_number,
                d.raw_text.trim()
            )
        })
        .collect();
    let count = unresolved.len();

    let mut outcome = CommandOutcome::from_value(ValidationOutput {
        scanned_files: request.source_files.len(),
        unresolved: unresolved.into_iter().map(UnresolvedInclude::from).collect(),
    })?;
    for line in lines {
        outcome = outcome.with_line(line);
    }

    if count == 0 {
        outcome = outcome.with_line(format!(
            "All includes of {} source files resolved.",
            request.source_files.len()
        ));
    } else {
        outcome.failure = Some(format!("{count} include directives could not be resolved"));
        outcome = outcome.with_hint(
            HintKind::Action,
            "Run `srcgraph detect-search-paths` to find header_search_paths candidates.",
        );
    }
    Ok(outcome)
}

pub fn detect_search_paths(ctx: &CommandContext, roots: &[PathBuf]) -> Result<CommandOutcome> {
    let project = &ctx.project;
    let roots: Vec<PathBuf> = if roots.is_empty() {
        vec![project.root().to_path_buf()]
    } else {
        roots.iter().map(|r| resolve_path(project.root(), r)).collect()
    };
    let sources = project.scan_sources()?;
    let log = LogContext::for_new_run();

    let found = get_header_search_directories(
        &sources,
        &roots,
        &project.header_search_paths(),
        progress_granularity(sources.len()),
        &log,
        &|| ctx.cancel.is_cancelled(),
        &mut report_progress("Detecting search paths"),
    )?;

    let search_paths: Vec<PathBuf> = found.into_iter().collect();
    let mut outcome = CommandOutcome::from_value(SearchPathOutput {
        roots,
        search_paths: search_paths.clone(),
    })?;
    if search_paths.is_empty() {
        outcome = outcome.with_line("No additional header search paths needed.");
    } else {
        for path in &search_paths {
            outcome = outcome.with_line(display_relative(project.root(), path));
        }
        outcome = outcome.with_hint(
            HintKind::Info,
            "Add these directories to header_search_paths of a cxx source group.",
        );
    }
    Ok(outcome)
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map_or_else(|_| path.display().to_string(), |p| p.display().to_string())
}
