//! Language front-end seam.
//!
//! A [`SourceParser`] turns one source file into records written through a
//! [`ParserClient`]. Workers run parsers against a [`UnitCollector`]; only the pipeline thread
//! replays the collected unit into the store.

use regex::Regex;
use srcgraph_includes::scan_directives;
use srcgraph_store::{
    CollectedUnit, EdgeKind, EdgeRecord, ErrorRecord, NodeRecord, ParseLocation, ParserClient,
    StoreError, SymbolKind, SymbolRecord, UnitCollector,
};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseFailure {
    pub message: String,
}

impl ParseFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<StoreError> for ParseFailure {
    fn from(err: StoreError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<std::io::Error> for ParseFailure {
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("cannot read source: {err}"))
    }
}

pub trait SourceParser: Send + Sync {
    /// Parse `path`. The file is already registered with the client. Returning an error
    /// marks the whole file as failed.
    fn parse(&self, path: &Path, client: &mut dyn ParserClient) -> Result<(), ParseFailure>;
}

/// Run `parser` on one file and buffer everything it reports.
///
/// Never fails: a parse failure or a panic inside the parser becomes a fatal error located at
/// the start of the file.
pub fn collect_unit(parser: &dyn SourceParser, path: &Path) -> CollectedUnit {
    let mut collector = UnitCollector::new(path);
    let file = match collector.record_file(path, true) {
        Ok(id) => id,
        Err(err) => {
            log::error!("Cannot register {}: {err}", path.display());
            return collector.into_unit();
        }
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| parser.parse(path, &mut collector)));
    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(failure)) => Some(failure.message),
        Err(_) => Some("parser panicked".to_string()),
    };

    if let Some(message) = failure {
        log::debug!("Parsing {} failed: {message}", path.display());
        let recorded = collector.record_error(ErrorRecord {
            message,
            is_fatal: true,
            is_indexed_file: true,
            source_file: path.to_path_buf(),
            location: ParseLocation::file_start(file),
        });
        if let Err(err) = recorded {
            log::error!("Cannot record parse failure for {}: {err}", path.display());
        }
    }
    collector.into_unit()
}

fn define_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*#\s*define\s+([A-Za-z_][A-Za-z0-9_]*)")
            .expect("define pattern is valid")
    })
}

/// Preprocessor-level front end: file nodes, include edges and macro definitions.
///
/// Resolved headers are registered without resetting their indexed state and contribute
/// their own file node. Directives that cannot be resolved are reported as non-fatal errors.
#[derive(Debug, Clone, Default)]
pub struct IncludeGraphParser {
    search_paths: Vec<PathBuf>,
}

impl IncludeGraphParser {
    #[must_use]
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }
}

impl SourceParser for IncludeGraphParser {
    fn parse(&self, path: &Path, client: &mut dyn ParserClient) -> Result<(), ParseFailure> {
        let content = fs::read_to_string(path)?;
        let file = client.record_file(path, true)?;
        let file_node =
            client.record_symbol(SymbolRecord::Node(NodeRecord::file_node(path, file)))?;

        for (index, line) in content.lines().enumerate() {
            if let Some(name) = define_pattern().captures(line).and_then(|c| c.get(1)) {
                let line_number = u32::try_from(index + 1).unwrap_or(u32::MAX);
                let column = u32::try_from(name.start() + 1).unwrap_or(u32::MAX);
                let node = NodeRecord::new(name.as_str(), SymbolKind::Macro, file)
                    .at(line_number, column);
                client.record_symbol(SymbolRecord::Node(node))?;
            }
        }

        for directive in scan_directives(path, &content) {
            let directive = directive.resolved(&self.search_paths);
            match &directive.resolved_path {
                Some(header) => {
                    let header_file = client.record_file(header, false)?;
                    let header_node = client.record_symbol(SymbolRecord::Node(
                        NodeRecord::file_node(header, header_file),
                    ))?;
                    let edge = EdgeRecord::new(file_node, header_node, EdgeKind::Include, file)
                        .at(directive.line_number, 1);
                    client.record_symbol(SymbolRecord::Edge(edge))?;
                }
                None => {
                    client.record_error(ErrorRecord {
                        message: format!("cannot resolve include {}", directive.raw_text.trim()),
                        is_fatal: false,
                        is_indexed_file: true,
                        source_file: path.to_path_buf(),
                        location: ParseLocation::new(file, directive.line_number, 1),
                    })?;
                }
            }
        }
        Ok(())
    }
}
