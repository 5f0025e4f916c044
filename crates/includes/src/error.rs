use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolverError>;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("IO error reading {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Search root is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Search path detection was stopped")]
    Stopped,
}
