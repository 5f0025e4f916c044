use crate::config::IndexerConfig;
use crate::error::{IndexerError, Result};
use crate::parser::IncludeGraphParser;
use crate::pipeline::PipelineOptions;
use crate::planner::{plan_refresh, RefreshInfo, RefreshMode};
use crate::scanner::FileScanner;
use crate::snapshot::SourceSnapshot;
use crate::stages::IncludeValidationRequest;
use srcgraph_store::PersistentSymbolStore;
use std::path::{Path, PathBuf};

/// A project root with its configuration: the glue between config, scanner, planner and
/// pipeline.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: IndexerConfig,
}

impl Project {
    pub fn new(root: impl AsRef<Path>, config: IndexerConfig) -> Result<Self> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|err| {
            IndexerError::InvalidPath(format!("{}: {err}", root.display()))
        })?;
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root, config })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn config(&self) -> &IndexerConfig {
        &self.config
    }

    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.config.store_path(&self.root)
    }

    pub fn open_store(&self) -> Result<PersistentSymbolStore> {
        let path = self.store_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(PersistentSymbolStore::open_with_options(
            path,
            self.config.store_options(),
        )?)
    }

    pub fn scan_sources(&self) -> Result<Vec<PathBuf>> {
        FileScanner::new(&self.root).scan(&self.config.source_groups)
    }

    #[must_use]
    pub fn header_search_paths(&self) -> Vec<PathBuf> {
        self.config.header_search_paths(&self.root)
    }

    /// Plan a refresh of `store`, which must be in read mode.
    pub fn plan(&self, store: &PersistentSymbolStore, mode: RefreshMode) -> Result<RefreshInfo> {
        let known = store.file_records()?;
        let sources = self.scan_sources()?;
        let snapshot = SourceSnapshot::capture(sources, &known, self.config.indexing.fingerprint);
        Ok(plan_refresh(mode, &known, &snapshot))
    }

    #[must_use]
    pub fn include_validation_request(
        &self,
        source_files: Vec<PathBuf>,
    ) -> IncludeValidationRequest {
        IncludeValidationRequest {
            source_files,
            indexed_paths: self.config.indexed_paths(&self.root).into_iter().collect(),
            search_paths: self.header_search_paths(),
        }
    }

    /// Pipeline options from the configuration, with include validation prepared for
    /// `info` when enabled.
    #[must_use]
    pub fn pipeline_options(&self, info: &RefreshInfo) -> PipelineOptions {
        let options = PipelineOptions::from_config(&self.config);
        if self.config.indexing.validate_includes {
            let request = self.include_validation_request(info.files_to_index.clone());
            options.with_include_validation(
                request,
                self.config.indexing.fail_on_unresolved_includes,
            )
        } else {
            options
        }
    }

    #[must_use]
    pub fn parser(&self) -> IncludeGraphParser {
        IncludeGraphParser::new(self.header_search_paths())
    }
}
