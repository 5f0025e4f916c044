use crate::error::{IndexerError, Result};
use crate::snapshot::SourceSnapshot;
use serde::{Deserialize, Serialize};
use srcgraph_store::FileRecord;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Files that are new, modified or deleted, plus everything depending on them.
    UpdatedFiles,
    /// As above, plus files whose last indexing did not complete.
    UpdatedAndIncompleteFiles,
    /// Everything, from scratch.
    AllFiles,
}

impl RefreshMode {
    /// Modes worth offering. Incremental modes need something to compare against.
    #[must_use]
    pub fn available_for(store_has_files: bool) -> Vec<Self> {
        if store_has_files {
            vec![
                Self::UpdatedFiles,
                Self::UpdatedAndIncompleteFiles,
                Self::AllFiles,
            ]
        } else {
            vec![Self::AllFiles]
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpdatedFiles => "updated",
            Self::UpdatedAndIncompleteFiles => "incomplete",
            Self::AllFiles => "all",
        }
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshMode {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "updated" => Ok(Self::UpdatedFiles),
            "incomplete" => Ok(Self::UpdatedAndIncompleteFiles),
            "all" => Ok(Self::AllFiles),
            other => Err(IndexerError::Other(format!(
                "unknown refresh mode '{other}' (expected updated, incomplete or all)"
            ))),
        }
    }
}

/// Files to purge from and to feed into the store, in lexicographic order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshInfo {
    pub mode: RefreshMode,
    pub files_to_clear: Vec<PathBuf>,
    pub files_to_index: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub mode: RefreshMode,
    pub clear_count: usize,
    pub index_count: usize,
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} refresh: {} files to clear, {} files to index",
            self.mode, self.clear_count, self.index_count
        )
    }
}

impl RefreshInfo {
    #[must_use]
    pub fn summary(&self) -> RefreshSummary {
        RefreshSummary {
            mode: self.mode,
            clear_count: self.files_to_clear.len(),
            index_count: self.files_to_index.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files_to_clear.is_empty() && self.files_to_index.is_empty()
    }
}

/// Decide which files a refresh in `mode` has to clear and index.
///
/// A file changed when it is new, its fingerprint differs from the stored one, or it no
/// longer exists. Except for [`RefreshMode::AllFiles`], the changed set is widened with
/// everything that transitively depends on it.
#[must_use]
pub fn plan_refresh(
    mode: RefreshMode,
    known: &[FileRecord],
    snapshot: &SourceSnapshot,
) -> RefreshInfo {
    let known_paths: BTreeSet<&Path> = known.iter().map(|r| r.path.as_path()).collect();

    let affected: BTreeSet<&Path> = if mode == RefreshMode::AllFiles {
        known_paths
            .iter()
            .copied()
            .chain(snapshot.source_files.keys().map(PathBuf::as_path))
            .collect()
    } else {
        let changed = changed_files(mode, known, snapshot);
        dependency_closure(changed, known)
    };

    RefreshInfo {
        mode,
        files_to_clear: affected
            .iter()
            .filter(|path| known_paths.contains(*path))
            .map(|path| path.to_path_buf())
            .collect(),
        files_to_index: affected
            .iter()
            .filter(|path| snapshot.is_source(path))
            .map(|path| path.to_path_buf())
            .collect(),
    }
}

fn changed_files<'a>(
    mode: RefreshMode,
    known: &'a [FileRecord],
    snapshot: &'a SourceSnapshot,
) -> BTreeSet<&'a Path> {
    let mut changed = BTreeSet::new();
    let by_path: HashMap<&Path, &FileRecord> =
        known.iter().map(|r| (r.path.as_path(), r)).collect();

    for path in snapshot.source_files.keys() {
        if !by_path.contains_key(path.as_path()) {
            changed.insert(path.as_path());
        }
    }

    for record in known {
        let current = snapshot.fingerprint(&record.path);
        let modified = match (current, record.fingerprint.as_ref()) {
            (None, _) => true,
            (Some(now), Some(before)) => now != before,
            (Some(_), None) => true,
        };
        let incomplete = mode == RefreshMode::UpdatedAndIncompleteFiles && !record.indexed;
        if modified || incomplete {
            changed.insert(record.path.as_path());
        }
    }

    changed
}

/// Everything that reaches `seeds` through stored dependency edges, seeds included.
fn dependency_closure<'a>(
    seeds: BTreeSet<&'a Path>,
    known: &'a [FileRecord],
) -> BTreeSet<&'a Path> {
    let mut dependents: HashMap<&Path, Vec<&Path>> = HashMap::new();
    for record in known {
        for dependency in &record.dependencies {
            dependents
                .entry(dependency.as_path())
                .or_default()
                .push(record.path.as_path());
        }
    }

    let mut closure = seeds.clone();
    let mut worklist: Vec<&Path> = seeds.into_iter().collect();
    while let Some(path) = worklist.pop() {
        for &dependent in dependents.get(path).into_iter().flatten() {
            if closure.insert(dependent) {
                worklist.push(dependent);
            }
        }
    }
    closure
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use srcgraph_store::Fingerprint;
    use std::collections::BTreeMap;

    fn fp(tag: &str) -> Fingerprint {
        Fingerprint::ContentHash {
            blake3: tag.to_string(),
        }
    }

    fn record(path: &str, tag: &str, indexed: bool, deps: &[&str]) -> FileRecord {
        FileRecord {
            path: path.into(),
            fingerprint: Some(fp(tag)),
            indexed,
            dependencies: deps.iter().map(PathBuf::from).collect(),
        }
    }

    fn snapshot(sources: &[(&str, &str)]) -> SourceSnapshot {
        SourceSnapshot {
            source_files: sources
                .iter()
                .map(|(path, tag)| (PathBuf::from(path), fp(tag)))
                .collect(),
            dependency_files: BTreeMap::new(),
        }
    }

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn modified_header_pulls_in_its_includers() {
        let known = [
            record("/p/a.c", "a1", true, &["/p/b.h"]),
            record("/p/b.h", "b1", true, &[]),
            record("/p/other.c", "o1", true, &[]),
        ];
        let now = snapshot(&[("/p/a.c", "a1"), ("/p/b.h", "b2"), ("/p/other.c", "o1")]);

        let plan = plan_refresh(RefreshMode::UpdatedFiles, &known, &now);
        assert_eq!(plan.files_to_clear, paths(&["/p/a.c", "/p/b.h"]));
        assert_eq!(plan.files_to_index, paths(&["/p/a.c", "/p/b.h"]));
    }

    #[test]
    fn unchanged_tree_plans_nothing() {
        let known = [
            record("/p/a.c", "a1", true, &["/p/b.h"]),
            record("/p/b.h", "b1", true, &[]),
        ];
        let now = snapshot(&[("/p/a.c", "a1"), ("/p/b.h", "b1")]);

        let plan = plan_refresh(RefreshMode::UpdatedFiles, &known, &now);
        assert!(plan.is_empty());
    }

    #[test]
    fn deleted_files_are_only_cleared() {
        let known = [
            record("/p/a.c", "a1", true, &["/p/gone.h"]),
            record("/p/gone.h", "g1", true, &[]),
        ];
        let now = snapshot(&[("/p/a.c", "a1")]);

        let plan = plan_refresh(RefreshMode::UpdatedFiles, &known, &now);
        assert_eq!(plan.files_to_clear, paths(&["/p/a.c", "/p/gone.h"]));
        assert_eq!(plan.files_to_index, paths(&["/p/a.c"]));
    }

    #[test]
    fn incomplete_mode_retries_files_that_did_not_finish() {
        let known = [
            record("/p/a.c", "a1", false, &[]),
            record("/p/b.c", "b1", true, &[]),
        ];
        let now = snapshot(&[("/p/a.c", "a1"), ("/p/b.c", "b1"), ("/p/new.c", "n1")]);

        let updated = plan_refresh(RefreshMode::UpdatedFiles, &known, &now);
        assert_eq!(updated.files_to_index, paths(&["/p/new.c"]));
        assert!(updated.files_to_clear.is_empty());

        let incomplete = plan_refresh(RefreshMode::UpdatedAndIncompleteFiles, &known, &now);
        assert_eq!(incomplete.files_to_index, paths(&["/p/a.c", "/p/new.c"]));
        assert_eq!(incomplete.files_to_clear, paths(&["/p/a.c"]));
    }

    #[test]
    fn closure_is_transitive_and_survives_cycles() {
        let known = [
            record("/p/main.c", "m", true, &["/p/x.h"]),
            record("/p/x.h", "x", true, &["/p/y.h"]),
            record("/p/y.h", "y", true, &["/p/x.h", "/p/z.h"]),
            record("/p/z.h", "z", true, &[]),
            record("/p/unrelated.c", "u", true, &[]),
        ];
        let now = snapshot(&[
            ("/p/main.c", "m"),
            ("/p/x.h", "x"),
            ("/p/y.h", "y"),
            ("/p/z.h", "z2"),
            ("/p/unrelated.c", "u"),
        ]);

        let plan = plan_refresh(RefreshMode::UpdatedFiles, &known, &now);
        assert_eq!(
            plan.files_to_index,
            paths(&["/p/main.c", "/p/x.h", "/p/y.h", "/p/z.h"])
        );
    }

    #[test]
    fn all_files_indexes_every_existing_source_and_clears_every_known_file() {
        let known = [
            record("/p/a.c", "a1", true, &[]),
            record("/p/gone.c", "g1", true, &[]),
        ];
        let now = snapshot(&[("/p/a.c", "a1"), ("/p/b.c", "b1")]);

        let plan = plan_refresh(RefreshMode::AllFiles, &known, &now);
        assert_eq!(plan.files_to_clear, paths(&["/p/a.c", "/p/gone.c"]));
        assert_eq!(plan.files_to_index, paths(&["/p/a.c", "/p/b.c"]));
        assert_eq!(
            plan.summary(),
            RefreshSummary {
                mode: RefreshMode::AllFiles,
                clear_count: 2,
                index_count: 2,
            }
        );
    }

    #[test]
    fn known_headers_outside_the_source_set_are_not_indexed_directly() {
        let known = [
            record("/p/a.c", "a1", true, &["/usr/include/lib.h"]),
            record("/usr/include/lib.h", "l1", true, &[]),
        ];
        let mut now = snapshot(&[("/p/a.c", "a1")]);
        now.dependency_files
            .insert("/usr/include/lib.h".into(), fp("l1"));
        assert!(plan_refresh(RefreshMode::UpdatedFiles, &known, &now).is_empty());

        now.dependency_files
            .insert("/usr/include/lib.h".into(), fp("l2"));
        let plan = plan_refresh(RefreshMode::UpdatedFiles, &known, &now);
        assert_eq!(plan.files_to_clear, paths(&["/p/a.c", "/usr/include/lib.h"]));
        assert_eq!(plan.files_to_index, paths(&["/p/a.c"]));
    }

    #[test]
    fn incremental_modes_need_existing_data() {
        assert_eq!(RefreshMode::available_for(false), vec![RefreshMode::AllFiles]);
        assert_eq!(RefreshMode::available_for(true).len(), 3);
        assert_eq!(
            "incomplete".parse::<RefreshMode>().unwrap(),
            RefreshMode::UpdatedAndIncompleteFiles
        );
        assert!("sometimes".parse::<RefreshMode>().is_err());
    }
}
