use crate::fingerprint::FingerprintStrategy;
use srcgraph_store::{FileRecord, Fingerprint};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Files on disk at planning time, with fingerprints.
///
/// `source_files` are the files the configured source groups select; they are the only ones
/// ever scheduled for indexing. `dependency_files` are other files the store already knows
/// (typically headers outside the source set) that still exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub source_files: BTreeMap<PathBuf, Fingerprint>,
    pub dependency_files: BTreeMap<PathBuf, Fingerprint>,
}

impl SourceSnapshot {
    /// Fingerprint `source_files` and every known record that is not a source file.
    /// Files that cannot be read are treated as missing.
    pub fn capture(
        source_files: impl IntoIterator<Item = PathBuf>,
        known: &[FileRecord],
        strategy: FingerprintStrategy,
    ) -> Self {
        let mut snapshot = Self::default();
        for path in source_files {
            match strategy.compute(&path) {
                Ok(fingerprint) => {
                    snapshot.source_files.insert(path, fingerprint);
                }
                Err(err) => log::debug!("Skipping unreadable source {}: {err}", path.display()),
            }
        }
        for record in known {
            if snapshot.source_files.contains_key(&record.path) {
                continue;
            }
            if let Ok(fingerprint) = strategy.compute(&record.path) {
                snapshot
                    .dependency_files
                    .insert(record.path.clone(), fingerprint);
            }
        }
        snapshot
    }

    #[must_use]
    pub fn fingerprint(&self, path: &Path) -> Option<&Fingerprint> {
        self.source_files
            .get(path)
            .or_else(|| self.dependency_files.get(path))
    }

    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        self.fingerprint(path).is_some()
    }

    #[must_use]
    pub fn is_source(&self, path: &Path) -> bool {
        self.source_files.contains_key(path)
    }
}
