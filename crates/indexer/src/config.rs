//! `srcgraph.toml` loading.
//!
//! Every field has a default, so an absent file or an empty table is a valid configuration.
//! Relative paths are resolved against the project root.

use crate::error::{IndexerError, Result};
use crate::fingerprint::FingerprintStrategy;
use crate::source_group::{SourceGroup, SourceGroupCapabilities};
use serde::{Deserialize, Serialize};
use srcgraph_store::StoreOptions;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "srcgraph.toml";

const ENV_WORKERS: &str = "SRCGRAPH_WORKERS";
const ENV_STORE: &str = "SRCGRAPH_STORE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub store: StoreSection,
    pub indexing: IndexingSection,
    pub lock: LockSection,
    #[serde(rename = "source_group")]
    pub source_groups: Vec<SourceGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".srcgraph/symbols.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSection {
    /// Parser threads. 0 parses inline on the pipeline thread.
    pub worker_count: usize,
    pub tick_interval_ms: u64,
    pub clear_batch_size: usize,
    pub fingerprint: FingerprintStrategy,
    pub validate_includes: bool,
    pub fail_on_unresolved_includes: bool,
    pub keep_interrupted: bool,
    pub shallow: bool,
}

impl Default for IndexingSection {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            tick_interval_ms: 10,
            clear_batch_size: 256,
            fingerprint: FingerprintStrategy::default(),
            validate_includes: false,
            fail_on_unresolved_includes: false,
            keep_interrupted: true,
            shallow: false,
        }
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSection {
    pub stale_after_secs: u64,
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            stale_after_secs: 600,
        }
    }
}

impl IndexerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            IndexerError::ConfigError(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `explicit` if given (it must exist), otherwise `<project_root>/srcgraph.toml` if
    /// present, otherwise defaults.
    pub fn discover(project_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = project_root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            log::debug!("No {CONFIG_FILE_NAME} in {}, using defaults", project_root.display());
            Ok(Self::default())
        }
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(ENV_WORKERS) {
            self.indexing.worker_count = raw.trim().parse().map_err(|_| {
                IndexerError::ConfigError(format!("{ENV_WORKERS} must be a number, got '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup(ENV_STORE) {
            if raw.trim().is_empty() {
                return Err(IndexerError::ConfigError(format!("{ENV_STORE} is empty")));
            }
            self.store.path = PathBuf::from(raw.trim());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.indexing.clear_batch_size == 0 {
            return Err(IndexerError::ConfigError(
                "indexing.clear_batch_size must be positive".to_string(),
            ));
        }
        for group in &self.source_groups {
            if group.source_paths().is_some_and(<[PathBuf]>::is_empty) {
                return Err(IndexerError::ConfigError(format!(
                    "{} source group {} has no source_paths",
                    group.kind(),
                    group.name().unwrap_or("<unnamed>")
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn store_path(&self, project_root: &Path) -> PathBuf {
        resolve_path(project_root, &self.store.path)
    }

    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            lock_stale_after: Duration::from_secs(self.lock.stale_after_secs),
        }
    }

    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.indexing.tick_interval_ms)
    }

    /// Header search paths of all groups, resolved, in declaration order without repeats.
    #[must_use]
    pub fn header_search_paths(&self, project_root: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for group in &self.source_groups {
            for path in group.header_search_paths().unwrap_or_default() {
                let resolved = resolve_path(project_root, path);
                if !paths.contains(&resolved) {
                    paths.push(resolved);
                }
            }
        }
        paths
    }

    /// Source paths of all groups, resolved.
    #[must_use]
    pub fn indexed_paths(&self, project_root: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .source_groups
            .iter()
            .flat_map(|g| g.source_paths().unwrap_or_default())
            .map(|p| resolve_path(project_root, p))
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

/// Join relative paths onto `root` and canonicalize when the target exists.
#[must_use]
pub fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    joined.canonicalize().unwrap_or(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_group::CxxSourceGroup;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let config = IndexerConfig::from_toml_str("").unwrap();
        assert_eq!(config, IndexerConfig::default());
        assert_eq!(config.indexing.clear_batch_size, 256);
        assert_eq!(config.tick_interval(), Duration::from_millis(10));
    }

    #[test]
    fn parses_sections_and_tagged_source_groups() {
        let config = IndexerConfig::from_toml_str(
            r#"
[store]
path = "out/index.json"

[indexing]
worker_count = 0
fingerprint = "content_hash"
validate_includes = true

[lock]
stale_after_secs = 30

[[source_group]]
kind = "cxx"
name = "core"
source_paths = ["src"]
header_search_paths = ["include", "third_party/include"]
exclude_filters = ["**/generated/**"]

[[source_group]]
kind = "python"
source_paths = ["scripts"]
"#,
        )
        .unwrap();

        assert_eq!(config.indexing.worker_count, 0);
        assert_eq!(config.indexing.fingerprint, FingerprintStrategy::ContentHash);
        assert!(config.indexing.validate_includes);
        assert_eq!(config.store_options().lock_stale_after, Duration::from_secs(30));
        assert_eq!(config.source_groups.len(), 2);

        let SourceGroup::Cxx(CxxSourceGroup {
            source_extensions, ..
        }) = &config.source_groups[0]
        else {
            panic!("expected a cxx group");
        };
        assert!(source_extensions.contains(&".hpp".to_string()));
        assert_eq!(config.source_groups[1].header_search_paths(), None);

        let root = Path::new("/nonexistent/project");
        assert_eq!(
            config.header_search_paths(root),
            vec![root.join("include"), root.join("third_party/include")]
        );
        assert_eq!(config.store_path(root), root.join("out/index.json"));
    }

    #[test]
    fn unknown_group_kind_is_rejected() {
        let err = IndexerConfig::from_toml_str(
            "[[source_group]]\nkind = \"cobol\"\nsource_paths = [\"src\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, IndexerError::TomlError(_)));
    }

    #[test]
    fn group_without_source_paths_is_rejected() {
        let err =
            IndexerConfig::from_toml_str("[[source_group]]\nkind = \"java\"\nsource_paths = []\n")
                .unwrap_err();
        assert!(matches!(err, IndexerError::ConfigError(_)));
    }

    #[test]
    fn environment_overrides_win() {
        let mut config = IndexerConfig::default();
        config
            .apply_overrides_from(|key| match key {
                "SRCGRAPH_WORKERS" => Some("3".to_string()),
                "SRCGRAPH_STORE" => Some("/tmp/elsewhere.json".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.indexing.worker_count, 3);
        assert_eq!(config.store.path, PathBuf::from("/tmp/elsewhere.json"));

        let err = config
            .apply_overrides_from(|key| (key == "SRCGRAPH_WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, IndexerError::ConfigError(_)));
    }
}
