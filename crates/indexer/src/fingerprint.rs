use crate::error::Result;
use serde::{Deserialize, Serialize};
use srcgraph_store::Fingerprint;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// How file changes are detected between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintStrategy {
    /// Modification time plus size. Cheap, but misses same-size edits within one mtime tick.
    #[default]
    Mtime,
    /// blake3 over the file content.
    ContentHash,
}

impl FingerprintStrategy {
    pub fn compute(self, path: &Path) -> Result<Fingerprint> {
        match self {
            Self::Mtime => {
                let metadata = fs::metadata(path)?;
                let mtime_ms = metadata
                    .modified()?
                    .duration_since(UNIX_EPOCH)
                    .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                    .unwrap_or(0);
                Ok(Fingerprint::Mtime {
                    mtime_ms,
                    size: metadata.len(),
                })
            }
            Self::ContentHash => {
                let bytes = fs::read(path)?;
                Ok(Fingerprint::ContentHash {
                    blake3: blake3::hash(&bytes).to_hex().to_string(),
                })
            }
        }
    }
}
