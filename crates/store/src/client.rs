use crate::error::Result;
use crate::types::{ElementId, ErrorRecord, FileId, SymbolRecord};
use std::path::{Path, PathBuf};

/// Write boundary used by language front ends.
///
/// Paths passed to [`ParserClient::record_file`] must already be canonical. Ids handed out by
/// one client are only meaningful to that client.
pub trait ParserClient {
    /// Register a file and return its id. Registering a known file returns the existing id;
    /// `reset_indexed_state` decides whether its indexed flag is cleared or kept.
    fn record_file(&mut self, path: &Path, reset_indexed_state: bool) -> Result<FileId>;

    fn record_symbol(&mut self, record: SymbolRecord) -> Result<ElementId>;

    fn record_error(&mut self, error: ErrorRecord) -> Result<()>;
}

/// Everything one parser invocation produced, with unit-local ids.
#[derive(Debug, Clone, Default)]
pub struct CollectedUnit {
    pub source_file: PathBuf,
    /// `FileId(i + 1)` refers to `files[i]`.
    pub files: Vec<(PathBuf, bool)>,
    /// `ElementId(i + 1)` refers to `symbols[i]`.
    pub symbols: Vec<SymbolRecord>,
    pub errors: Vec<ErrorRecord>,
}

impl CollectedUnit {
    #[must_use]
    pub fn fatal_error_count(&self) -> usize {
        self.errors.iter().filter(|e| e.is_fatal).count()
    }

    #[must_use]
    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|e| e.is_fatal)
    }
}

/// Worker-side [`ParserClient`] that buffers a whole unit instead of touching the store.
///
/// The finished unit travels to the write-token holder, which replays it through
/// `PersistentSymbolStore::apply_unit`.
#[derive(Debug, Default)]
pub struct UnitCollector {
    unit: CollectedUnit,
}

impl UnitCollector {
    #[must_use]
    pub fn new(source_file: impl Into<PathBuf>) -> Self {
        Self {
            unit: CollectedUnit {
                source_file: source_file.into(),
                ..CollectedUnit::default()
            },
        }
    }

    #[must_use]
    pub fn source_file(&self) -> &Path {
        &self.unit.source_file
    }

    #[must_use]
    pub fn into_unit(self) -> CollectedUnit {
        self.unit
    }
}

impl ParserClient for UnitCollector {
    fn record_file(&mut self, path: &Path, reset_indexed_state: bool) -> Result<FileId> {
        if let Some(pos) = self.unit.files.iter().position(|(p, _)| p == path) {
            if reset_indexed_state {
                self.unit.files[pos].1 = true;
            }
            return Ok(local_file_id(pos));
        }
        self.unit.files.push((path.to_path_buf(), reset_indexed_state));
        Ok(local_file_id(self.unit.files.len() - 1))
    }

    fn record_symbol(&mut self, record: SymbolRecord) -> Result<ElementId> {
        self.unit.symbols.push(record);
        Ok(ElementId(self.unit.symbols.len() as u64))
    }

    fn record_error(&mut self, error: ErrorRecord) -> Result<()> {
        self.unit.errors.push(error);
        Ok(())
    }
}

const fn local_file_id(index: usize) -> FileId {
    FileId(index as u64 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeRecord, ParseLocation, SymbolKind};

    #[test]
    fn collector_deduplicates_files_and_numbers_symbols() {
        let mut collector = UnitCollector::new("/src/a.c");
        let a = collector.record_file(Path::new("/src/a.c"), true).unwrap();
        let b = collector.record_file(Path::new("/src/b.h"), false).unwrap();
        let again = collector.record_file(Path::new("/src/b.h"), true).unwrap();
        assert_eq!(a, FileId(1));
        assert_eq!(b, FileId(2));
        assert_eq!(again, b);

        let first = collector
            .record_symbol(SymbolRecord::Node(NodeRecord::new("main", SymbolKind::Function, a)))
            .unwrap();
        assert_eq!(first, ElementId(1));

        collector
            .record_error(ErrorRecord {
                message: "boom".into(),
                is_fatal: true,
                is_indexed_file: true,
                source_file: "/src/a.c".into(),
                location: ParseLocation::file_start(a),
            })
            .unwrap();

        let unit = collector.into_unit();
        assert_eq!(unit.files[1], (PathBuf::from("/src/b.h"), true));
        assert!(unit.has_fatal_error());
        assert_eq!(unit.fatal_error_count(), 1);
    }
}
