use crate::directive::{read_directives, IncludeDirective};
use crate::error::{Result, ResolverError};
use crate::log_context::LogContext;
use crate::progress::ProgressBatcher;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Resolve one directive.
///
/// Quoted includes are tried relative to the including file's directory first; after that
/// every search path is tried in order. The first existing file wins.
#[must_use]
pub fn resolve_include(directive: &IncludeDirective, search_paths: &[PathBuf]) -> Option<PathBuf> {
    let target = Path::new(&directive.include_target);
    if target.is_absolute() {
        return existing_file(target);
    }

    if directive.uses_quotes {
        let local = directive
            .including_file
            .parent()
            .and_then(|dir| existing_file(&dir.join(target)));
        if local.is_some() {
            return local;
        }
    }

    search_paths
        .iter()
        .find_map(|dir| existing_file(&dir.join(target)))
}

impl IncludeDirective {
    /// The directive with `resolved_path` filled in from [`resolve_include`].
    #[must_use]
    pub fn resolved(mut self, search_paths: &[PathBuf]) -> Self {
        self.resolved_path = resolve_include(&self, search_paths);
        self
    }
}

fn existing_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        Some(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()))
    } else {
        None
    }
}

fn is_under_any(path: &Path, roots: &BTreeSet<PathBuf>) -> bool {
    roots.iter().any(|root| path.starts_with(root))
}

/// Every directive in `source_files` that cannot be resolved against `search_paths`.
///
/// Headers that resolve to a location under one of `indexed_paths` are scanned as well, each
/// exactly once. Unreadable files are skipped with a warning. The result is ordered by
/// including file, then line.
///
/// `stop` is polled before each source file. Once it returns true the scan ends, the final
/// progress report is skipped and the result only covers the files scanned so far.
pub fn get_unresolved_include_directives(
    source_files: &[PathBuf],
    indexed_paths: &BTreeSet<PathBuf>,
    search_paths: &[PathBuf],
    granularity: usize,
    log: &LogContext,
    stop: &dyn Fn() -> bool,
    on_progress: &mut dyn FnMut(f32),
) -> Vec<IncludeDirective> {
    let mut unresolved = Vec::new();
    let mut scanned: HashSet<PathBuf> = HashSet::new();
    let mut progress = ProgressBatcher::new(source_files.len(), granularity, on_progress);
    let mut stopped = false;

    for (done, source_file) in source_files.iter().enumerate() {
        if stop() {
            log.info(format_args!(
                "Include validation stopped after {done} of {} source files",
                source_files.len()
            ));
            stopped = true;
            break;
        }
        let mut queue = vec![source_file.clone()];
        while let Some(file) = queue.pop() {
            if !scanned.insert(file.clone()) {
                continue;
            }
            let directives = match read_directives(&file) {
                Ok(directives) => directives,
                Err(err) => {
                    log.warn(format_args!("Skipping include scan: {err}"));
                    continue;
                }
            };

            for directive in directives {
                let directive = directive.resolved(search_paths);
                match &directive.resolved_path {
                    Some(path) => {
                        if is_under_any(path, indexed_paths) && !scanned.contains(path) {
                            queue.push(path.clone());
                        }
                    }
                    None => unresolved.push(directive),
                }
            }
        }
        progress.advance();
    }
    if !stopped {
        progress.finish();
    }

    unresolved.sort();
    log.debug(format_args!(
        "Include validation scanned {} files, {} unresolved directives",
        scanned.len(),
        unresolved.len()
    ));
    unresolved
}

/// Directories that would make currently unresolvable directives resolvable.
///
/// For every directive of `source_files` that does not resolve against
/// `known_search_paths`, files under `candidate_roots` whose path ends with the include text
/// are looked up; the directory left after removing the include text from such a path is
/// suggested. Headers found this way are scanned too, so nested requirements surface.
///
/// A scan ended through `stop` fails with [`ResolverError::Stopped`].
pub fn get_header_search_directories(
    source_files: &[PathBuf],
    candidate_roots: &[PathBuf],
    known_search_paths: &[PathBuf],
    granularity: usize,
    log: &LogContext,
    stop: &dyn Fn() -> bool,
    on_progress: &mut dyn FnMut(f32),
) -> Result<BTreeSet<PathBuf>> {
    let index = FileNameIndex::build(candidate_roots, log)?;
    let mut suggested = BTreeSet::new();
    let mut scanned: HashSet<PathBuf> = HashSet::new();
    let mut progress = ProgressBatcher::new(source_files.len(), granularity, on_progress);

    for source_file in source_files {
        if stop() {
            return Err(ResolverError::Stopped);
        }
        let mut queue = vec![source_file.clone()];
        while let Some(file) = queue.pop() {
            if !scanned.insert(file.clone()) {
                continue;
            }
            let directives = match read_directives(&file) {
                Ok(directives) => directives,
                Err(err) => {
                    log.warn(format_args!("Skipping include scan: {err}"));
                    continue;
                }
            };

            for directive in directives {
                if resolve_include(&directive, known_search_paths).is_some() {
                    continue;
                }
                for (directory, header) in index.resolving_directories(&directive.include_target) {
                    suggested.insert(directory);
                    if !scanned.contains(&header) {
                        queue.push(header);
                    }
                }
            }
        }
        progress.advance();
    }
    progress.finish();

    log.info(format_args!(
        "Detected {} header search path candidates under {} roots",
        suggested.len(),
        candidate_roots.len()
    ));
    Ok(suggested)
}

/// All files below the candidate roots, keyed by file name. Built with one walk per root.
struct FileNameIndex<'a> {
    roots: &'a [PathBuf],
    by_name: HashMap<OsString, Vec<PathBuf>>,
}

impl<'a> FileNameIndex<'a> {
    fn build(roots: &'a [PathBuf], log: &LogContext) -> Result<Self> {
        let mut by_name: HashMap<OsString, Vec<PathBuf>> = HashMap::new();
        for root in roots {
            if !root.is_dir() {
                return Err(ResolverError::InvalidRoot(root.clone()));
            }
            for entry in WalkDir::new(root).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        log.debug(format_args!("Skipping unreadable entry: {err}"));
                        continue;
                    }
                };
                if entry.file_type().is_file() {
                    by_name
                        .entry(entry.file_name().to_os_string())
                        .or_default()
                        .push(entry.into_path());
                }
            }
        }
        Ok(Self { roots, by_name })
    }

    /// `(directory, header)` pairs where `directory.join(include_target) == header`.
    fn resolving_directories(&self, include_target: &str) -> Vec<(PathBuf, PathBuf)> {
        let target = Path::new(include_target);
        let Some(name) = target.file_name() else {
            return Vec::new();
        };
        let depth = target.components().count();

        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter(|candidate| candidate.ends_with(target))
            .filter_map(|candidate| {
                let mut directory = candidate.as_path();
                for _ in 0..depth {
                    directory = directory.parent()?;
                }
                self.roots
                    .iter()
                    .any(|root| directory.starts_with(root))
                    .then(|| (directory.to_path_buf(), candidate.clone()))
            })
            .collect()
    }
}
