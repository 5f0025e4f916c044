mod command;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use command::{CommandAction, CommandContext, CommandResponse, IndexRequest};
use env_logger::Env;
use srcgraph_indexer::RefreshMode;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "srcgraph")]
#[command(about = "Incremental symbol indexing for source trees", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Configuration file (defaults to srcgraph.toml in the project root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print the response as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which files a refresh would clear and index
    Plan {
        /// Refresh mode: updated, incomplete or all
        #[arg(short, long)]
        mode: Option<RefreshMode>,
    },

    /// Refresh the symbol store
    Index(IndexArgs),

    /// Report include directives that resolve nowhere
    ValidateIncludes,

    /// Suggest header search paths for unresolved includes
    DetectSearchPaths {
        /// Directories to search for headers (defaults to the project root)
        #[arg(short, long = "root")]
        roots: Vec<PathBuf>,
    },

    /// Show store statistics and recorded errors
    Stats,
}

#[derive(Args)]
struct IndexArgs {
    /// Refresh mode: updated, incomplete or all
    #[arg(short, long)]
    mode: Option<RefreshMode>,

    /// Parser threads (0 parses on the pipeline thread)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Discard the store if the run is interrupted
    #[arg(long)]
    discard_interrupted: bool,
}

impl Commands {
    fn into_action(self) -> CommandAction {
        match self {
            Self::Plan { mode } => CommandAction::Plan { mode },
            Self::Index(args) => CommandAction::Index(IndexRequest {
                mode: args.mode,
                workers: args.workers,
                assume_yes: args.yes,
                discard_interrupted: args.discard_interrupted,
            }),
            Self::ValidateIncludes => CommandAction::ValidateIncludes,
            Self::DetectSearchPaths { roots } => CommandAction::DetectSearchPaths { roots },
            Self::Stats => CommandAction::Stats,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    let json = cli.json;
    let response = match run(cli).await {
        Ok(response) => response,
        Err(err) => CommandResponse::error(format!("{err:#}")),
    };

    if let Err(err) = print_response(&response, json) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }
    if response.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run(cli: Cli) -> Result<CommandResponse> {
    let cancel = CancellationToken::new();
    let ctx = CommandContext::load(&cli.project, cli.config.as_deref(), cancel.clone())?;

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current file");
            interrupt.cancel();
        }
    });

    Ok(command::execute(cli.command.into_action(), ctx).await)
}

fn print_response(response: &CommandResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
    } else {
        print!("{}", command::render_text(response));
        eprint!("{}", command::render_diagnostics(response));
    }
    Ok(())
}
