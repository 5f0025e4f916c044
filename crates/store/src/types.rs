use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity of a file inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u64);

/// Identity of a node or an edge. Nodes and edges share one id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Store access mode. Exactly one mode is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    Read,
    Write,
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    File,
    Module,
    Namespace,
    Type,
    Function,
    Method,
    Field,
    Variable,
    Macro,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Include,
    Import,
    Call,
    Usage,
    TypeUsage,
    Inheritance,
    Member,
    Other,
}

impl EdgeKind {
    /// Edges of these kinds between file nodes make the owning file depend on the target file.
    #[must_use]
    pub const fn is_dependency(self) -> bool {
        matches!(self, Self::Include | Self::Import)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParseLocation {
    pub file: FileId,
    pub line: u32,
    pub column: u32,
}

impl ParseLocation {
    #[must_use]
    pub const fn new(file: FileId, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// Location used when an error can only be pinned to the file itself.
    #[must_use]
    pub const fn file_start(file: FileId) -> Self {
        Self::new(file, 1, 1)
    }
}

/// Content fingerprint used to detect file changes between runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fingerprint {
    Mtime { mtime_ms: u64, size: u64 },
    ContentHash { blake3: String },
}

/// Per-file state persisted across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    /// Whether the last indexing pass over this file finished without fatal errors.
    pub indexed: bool,
    #[serde(default)]
    pub dependencies: BTreeSet<PathBuf>,
}

impl FileRecord {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fingerprint: None,
            indexed: false,
            dependencies: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub name: String,
    pub kind: SymbolKind,
    /// File that declares or mentions the symbol. Clearing this file drops the contribution.
    pub file: FileId,
    pub position: Option<SourcePosition>,
}

impl NodeRecord {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SymbolKind, file: FileId) -> Self {
        Self {
            name: name.into(),
            kind,
            file,
            position: None,
        }
    }

    /// File nodes are named by the canonical path of the file.
    #[must_use]
    pub fn file_node(path: &Path, file: FileId) -> Self {
        Self::new(path.to_string_lossy(), SymbolKind::File, file)
    }

    #[must_use]
    pub const fn at(mut self, line: u32, column: u32) -> Self {
        self.position = Some(SourcePosition { line, column });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub source: ElementId,
    pub target: ElementId,
    pub kind: EdgeKind,
    /// File the relationship was recorded in.
    pub file: FileId,
    pub position: Option<SourcePosition>,
}

impl EdgeRecord {
    #[must_use]
    pub const fn new(source: ElementId, target: ElementId, kind: EdgeKind, file: FileId) -> Self {
        Self {
            source,
            target,
            kind,
            file,
            position: None,
        }
    }

    #[must_use]
    pub const fn at(mut self, line: u32, column: u32) -> Self {
        self.position = Some(SourcePosition { line, column });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolRecord {
    Node(NodeRecord),
    Edge(EdgeRecord),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub is_fatal: bool,
    /// Whether the file the error points into is itself part of the indexed set.
    pub is_indexed_file: bool,
    /// Translation unit that was being parsed when the error was found.
    pub source_file: PathBuf,
    pub location: ParseLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolNode {
    pub id: ElementId,
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePosition>,
    /// Files contributing this node; the node disappears when the set becomes empty.
    pub files: BTreeSet<FileId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEdge {
    pub id: ElementId,
    pub source: ElementId,
    pub target: ElementId,
    pub kind: EdgeKind,
    pub file: FileId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePosition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCountInfo {
    pub total: u64,
    pub fatal: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub file_count: u64,
    pub completed_file_count: u64,
    pub node_count: u64,
    pub edge_count: u64,
    pub error_count: u64,
}
