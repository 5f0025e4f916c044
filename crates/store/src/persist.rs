use crate::error::{Result, StoreError};
use crate::types::{ErrorRecord, FileId, FileRecord, SymbolEdge, SymbolNode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Bumped whenever the persisted layout changes. Stores written with another version are
/// refused instead of being migrated.
pub const STORAGE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: FileId,
    #[serde(flatten)]
    pub record: FileRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    pub storage_format_version: u32,
    pub next_file_id: u64,
    pub next_element_id: u64,
    pub files: Vec<StoredFile>,
    pub nodes: Vec<SymbolNode>,
    pub edges: Vec<SymbolEdge>,
    pub errors: Vec<ErrorRecord>,
}

#[derive(Deserialize)]
struct VersionHeader {
    storage_format_version: u32,
}

/// Path of the document written on the switch back to read mode, awaiting keep or discard.
#[must_use]
pub fn pending_path_for_store(store_path: &Path) -> PathBuf {
    with_suffix(store_path, "pending")
}

#[must_use]
pub fn lock_path_for_store(store_path: &Path) -> PathBuf {
    with_suffix(store_path, "lock")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

pub fn read_document(path: &Path) -> Result<Option<StoreDocument>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;

    let header: VersionHeader = serde_json::from_slice(&bytes)?;
    if header.storage_format_version != STORAGE_FORMAT_VERSION {
        return Err(StoreError::VersionMismatch {
            found: header.storage_format_version,
            expected: STORAGE_FORMAT_VERSION,
        });
    }

    Ok(Some(serde_json::from_slice(&bytes)?))
}

pub fn write_document(path: &Path, document: &StoreDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let bytes = serde_json::to_vec(document)?;
    let tmp = with_suffix(path, "tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
