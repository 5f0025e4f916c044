use crate::config::resolve_path;
use crate::error::Result;
use crate::source_group::{SourceGroup, SourceGroupCapabilities};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Collects the source files selected by the configured source groups (.gitignore aware).
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            root: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
        }
    }

    /// Canonical, sorted, duplicate-free paths of every file any group selects.
    pub fn scan(&self, groups: &[SourceGroup]) -> Result<Vec<PathBuf>> {
        let mut files = BTreeSet::new();
        for group in groups {
            let before = files.len();
            self.scan_group(group, &mut files)?;
            log::debug!(
                "Source group {} ({}) selected {} files",
                group.name().unwrap_or("<unnamed>"),
                group.kind(),
                files.len() - before
            );
        }
        Ok(files.into_iter().collect())
    }

    fn scan_group(&self, group: &SourceGroup, files: &mut BTreeSet<PathBuf>) -> Result<()> {
        let excludes = build_exclude_set(group.exclude_filters().unwrap_or_default())?;
        let extensions: Vec<String> = group
            .source_extensions()
            .unwrap_or_default()
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        for source_path in group.source_paths().unwrap_or_default() {
            let start = resolve_path(&self.root, source_path);
            if !start.exists() {
                log::warn!("Source path does not exist: {}", start.display());
                continue;
            }

            let walker = WalkBuilder::new(&start)
                .hidden(false)
                .git_ignore(true)
                .require_git(false)
                .build();

            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(err) => {
                        log::debug!("Skipping unreadable entry: {err}");
                        continue;
                    }
                };
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }

                let path = entry.path();
                if !matches_extension(path, &extensions) || self.is_excluded(&excludes, path) {
                    continue;
                }
                let canonical = path.canonicalize()?;
                files.insert(canonical);
            }
        }
        Ok(())
    }

    fn is_excluded(&self, excludes: &GlobSet, path: &Path) -> bool {
        if excludes.is_empty() {
            return false;
        }
        if excludes.is_match(path) {
            return true;
        }
        path.strip_prefix(&self.root)
            .is_ok_and(|relative| excludes.is_match(relative))
    }
}

fn build_exclude_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// An empty extension list accepts every file.
fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|wanted| *wanted == ext)
        })
}
