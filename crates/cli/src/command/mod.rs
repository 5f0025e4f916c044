pub mod domain;
mod services;

pub use domain::{CommandResponse, CommandStatus, HintKind};

use anyhow::{Context, Result};
use domain::CommandOutcome;
use srcgraph_indexer::{IndexerConfig, Project, RefreshMode};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub enum CommandAction {
    Plan { mode: Option<RefreshMode> },
    Index(IndexRequest),
    ValidateIncludes,
    DetectSearchPaths { roots: Vec<PathBuf> },
    Stats,
}

#[derive(Debug, Clone, Default)]
pub struct IndexRequest {
    pub mode: Option<RefreshMode>,
    pub workers: Option<usize>,
    pub assume_yes: bool,
    pub discard_interrupted: bool,
}

/// Everything a service needs about the project it works on.
pub struct CommandContext {
    pub project: Project,
    pub cancel: CancellationToken,
}

impl CommandContext {
    /// Load the configuration for `root` (explicit file, `srcgraph.toml`, or defaults) and
    /// apply environment overrides.
    pub fn load(root: &Path, config_path: Option<&Path>, cancel: CancellationToken) -> Result<Self> {
        let mut config = IndexerConfig::discover(root, config_path)
            .with_context(|| format!("Failed to load configuration for {}", root.display()))?;
        config.apply_env_overrides()?;
        let project = Project::new(root, config)?;
        Ok(Self { project, cancel })
    }
}

/// Run `action` on a blocking thread; the indexing pipeline and the include scans are
/// synchronous.
pub async fn execute(action: CommandAction, ctx: CommandContext) -> CommandResponse {
    let project = ctx.project.root().display().to_string();
    let store_path = ctx.project.store_path().display().to_string();

    let routed = tokio::task::spawn_blocking(move || services::route(action, &ctx)).await;
    let outcome: Result<CommandOutcome> = match routed {
        Ok(result) => result,
        Err(err) => Err(anyhow::anyhow!("command thread failed: {err}")),
    };

    let mut response = match outcome {
        Ok(outcome) => into_response(outcome),
        Err(err) => {
            log::debug!("Command failed: {err:?}");
            CommandResponse::error(format!("{err:#}"))
        }
    };
    response.meta.project = Some(project);
    response.meta.store_path = Some(store_path);
    response
}

fn into_response(outcome: CommandOutcome) -> CommandResponse {
    let mut meta = outcome.meta;
    meta.duration_ms = meta
        .duration_ms
        .or_else(|| Some(outcome.started.elapsed().as_millis() as u64));

    let status = if outcome.failure.is_some() {
        CommandStatus::Error
    } else {
        CommandStatus::Ok
    };
    CommandResponse {
        status,
        message: outcome.failure,
        hints: outcome.hints,
        data: outcome.data,
        meta,
        text: outcome.lines,
    }
}

/// Text-mode rendering of the service lines, for stdout.
pub fn render_text(response: &CommandResponse) -> String {
    let mut out = String::new();
    for line in &response.text {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// The message and hints, for stderr.
pub fn render_diagnostics(response: &CommandResponse) -> String {
    let mut out = String::new();
    if let Some(message) = &response.message {
        out.push_str(&format!("error: {message}\n"));
    }
    for hint in &response.hints {
        let label = match hint.kind {
            HintKind::Info => "note",
            HintKind::Action => "hint",
            HintKind::Warn => "warning",
        };
        out.push_str(&format!("{label}: {}\n", hint.text));
    }
    out
}
