use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Store error: {0}")]
    StoreError(#[from] srcgraph_store::StoreError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Include resolver error: {0}")]
    ResolverError(#[from] srcgraph_includes::ResolverError),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobError(#[from] globset::Error),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("{0} include directives could not be resolved")]
    UnresolvedIncludes(usize),

    #[error("Indexing was cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
