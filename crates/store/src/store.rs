use crate::client::{CollectedUnit, ParserClient};
use crate::error::{Result, StoreError};
use crate::graph::SymbolGraph;
use crate::lock::WriteLock;
use crate::persist::{
    lock_path_for_store, pending_path_for_store, read_document, write_document, StoreDocument,
    StoredFile, STORAGE_FORMAT_VERSION,
};
use crate::types::{
    EdgeKind, EdgeRecord, ElementId, ErrorCountInfo, ErrorRecord, FileId, FileRecord,
    Fingerprint, NodeRecord, ParseLocation, StorageStats, StoreMode, SymbolEdge, SymbolKind,
    SymbolNode, SymbolRecord,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const DEFAULT_LOCK_STALE_AFTER: Duration = Duration::from_secs(600);

type NodeKey = (SymbolKind, String);

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Age after which a write lock left behind by another process is reclaimed.
    pub lock_stale_after: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_stale_after: DEFAULT_LOCK_STALE_AFTER,
        }
    }
}

/// Outcome of replaying one worker unit into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedUnit {
    pub source_file: Option<FileId>,
    pub symbol_count: usize,
    pub error_count: usize,
    pub fatal_error_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    pub removed_nodes: usize,
    pub removed_edges: usize,
    pub removed_errors: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
struct StoreData {
    next_file_id: u64,
    next_element_id: u64,
    files: BTreeMap<FileId, FileRecord>,
    file_ids: HashMap<PathBuf, FileId>,
    nodes: BTreeMap<ElementId, SymbolNode>,
    node_ids: HashMap<NodeKey, ElementId>,
    edges: BTreeMap<ElementId, SymbolEdge>,
    errors: Vec<ErrorRecord>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            next_file_id: 1,
            next_element_id: 1,
            files: BTreeMap::new(),
            file_ids: HashMap::new(),
            nodes: BTreeMap::new(),
            node_ids: HashMap::new(),
            edges: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

impl StoreData {
    fn from_document(doc: StoreDocument) -> Self {
        let mut data = Self {
            next_file_id: doc.next_file_id.max(1),
            next_element_id: doc.next_element_id.max(1),
            errors: doc.errors,
            ..Self::default()
        };
        for stored in doc.files {
            data.file_ids.insert(stored.record.path.clone(), stored.id);
            data.files.insert(stored.id, stored.record);
        }
        for node in doc.nodes {
            data.node_ids.insert((node.kind, node.name.clone()), node.id);
            data.nodes.insert(node.id, node);
        }
        for edge in doc.edges {
            data.edges.insert(edge.id, edge);
        }
        data
    }

    fn to_document(&self) -> StoreDocument {
        StoreDocument {
            storage_format_version: STORAGE_FORMAT_VERSION,
            next_file_id: self.next_file_id,
            next_element_id: self.next_element_id,
            files: self
                .files
                .iter()
                .map(|(id, record)| StoredFile {
                    id: *id,
                    record: record.clone(),
                })
                .collect(),
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
            errors: self.errors.clone(),
        }
    }

    fn allocate_file_id(&mut self) -> FileId {
        let id = FileId(self.next_file_id);
        self.next_file_id += 1;
        id
    }

    fn allocate_element_id(&mut self) -> ElementId {
        let id = ElementId(self.next_element_id);
        self.next_element_id += 1;
        id
    }

    fn apply(&mut self, pending: PendingWrites) {
        for id in pending.resets {
            if let Some(record) = self.files.get_mut(&id) {
                record.indexed = false;
            }
        }
        for (id, record) in pending.files {
            self.file_ids.insert(record.path.clone(), id);
            self.files.insert(id, record);
        }
        self.node_ids.extend(pending.node_ids);
        self.nodes.extend(pending.nodes);
        for (node, file) in pending.contributions {
            if let Some(node) = self.nodes.get_mut(&node) {
                node.files.insert(file);
            }
        }
        for edge in pending.edges.values() {
            if !edge.kind.is_dependency() {
                continue;
            }
            let Some(target) = self
                .nodes
                .get(&edge.target)
                .filter(|n| n.kind == SymbolKind::File)
            else {
                continue;
            };
            let dependency = PathBuf::from(&target.name);
            if let Some(owner) = self.files.get_mut(&edge.file) {
                if owner.path != dependency {
                    owner.dependencies.insert(dependency);
                }
            }
        }
        self.edges.extend(pending.edges);
        self.errors.extend(pending.errors);
    }
}

/// Writes recorded since the last commit. Ids are allocated eagerly so callers can chain
/// records; nothing becomes visible until the whole batch validates.
#[derive(Debug, Default)]
struct PendingWrites {
    files: BTreeMap<FileId, FileRecord>,
    file_ids: HashMap<PathBuf, FileId>,
    resets: BTreeSet<FileId>,
    nodes: BTreeMap<ElementId, SymbolNode>,
    node_ids: HashMap<NodeKey, ElementId>,
    contributions: Vec<(ElementId, FileId)>,
    edges: BTreeMap<ElementId, SymbolEdge>,
    errors: Vec<ErrorRecord>,
}

impl PendingWrites {
    fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.resets.is_empty()
            && self.nodes.is_empty()
            && self.contributions.is_empty()
            && self.edges.is_empty()
            && self.errors.is_empty()
    }
}

/// Durable symbol graph plus error log, gated by a single read/write mode.
///
/// Mutations are only accepted in [`StoreMode::Write`]; statistics and queries only in
/// [`StoreMode::Read`]. A file-backed store holds a lock file from the first switch to write
/// mode until `keep` or `discard`, so only one process at a time can be the writer; other
/// producers must funnel their results to it.
#[derive(Debug)]
pub struct PersistentSymbolStore {
    path: Option<PathBuf>,
    options: StoreOptions,
    mode: StoreMode,
    data: StoreData,
    pending: PendingWrites,
    read_index: SymbolGraph,
    dependents: HashMap<PathBuf, BTreeSet<PathBuf>>,
    lock: Option<WriteLock>,
    baseline: Option<Box<StoreData>>,
    has_unkept_changes: bool,
}

impl PersistentSymbolStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, StoreOptions::default())
    }

    pub fn open_with_options(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.file_name().is_none() {
            return Err(StoreError::InvalidPath(format!(
                "store path has no file name: {}",
                path.display()
            )));
        }

        let pending = pending_path_for_store(&path);
        if pending.exists() {
            Self::drop_abandoned_pending(&path, &pending, &options)?;
        }

        let data = read_document(&path)?.map_or_else(StoreData::default, StoreData::from_document);
        let mut store = Self::with_data(Some(path), options, data);
        store.rebuild_read_index();

        log::info!(
            "Opened symbol store {} ({} files, {} nodes, {} edges)",
            store.path.as_deref().unwrap_or(Path::new("")).display(),
            store.data.files.len(),
            store.data.nodes.len(),
            store.data.edges.len()
        );
        Ok(store)
    }

    /// A pending document belongs to whoever holds the write lock. Only when the lock can be
    /// taken here (free or stale) is the owner gone and its undecided state dropped.
    fn drop_abandoned_pending(path: &Path, pending: &Path, options: &StoreOptions) -> Result<()> {
        let _lock = match WriteLock::acquire(&lock_path_for_store(path), options.lock_stale_after) {
            Ok(lock) => lock,
            Err(StoreError::WriteLocked { .. }) => {
                log::debug!(
                    "Leaving {} to the process holding the store lock",
                    pending.display()
                );
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        log::warn!(
            "Discarding undecided store state left by an earlier run: {}",
            pending.display()
        );
        match fs::remove_file(pending) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Store without a backing file; keep and discard work against an in-memory baseline.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_data(None, StoreOptions::default(), StoreData::default())
    }

    fn with_data(path: Option<PathBuf>, options: StoreOptions, data: StoreData) -> Self {
        Self {
            path,
            options,
            mode: StoreMode::Read,
            data,
            pending: PendingWrites::default(),
            read_index: SymbolGraph::default(),
            dependents: HashMap::new(),
            lock: None,
            baseline: None,
            has_unkept_changes: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub const fn mode(&self) -> StoreMode {
        self.mode
    }

    /// True after a write session finished and before `keep` or `discard` decided its fate.
    #[must_use]
    pub const fn has_unkept_changes(&self) -> bool {
        self.has_unkept_changes
    }

    pub fn set_mode(&mut self, mode: StoreMode) -> Result<()> {
        if self.mode == mode {
            return Ok(());
        }

        match mode {
            StoreMode::Write => {
                if let Some(path) = &self.path {
                    // Still held when the previous session has not been kept or discarded yet.
                    if self.lock.is_none() {
                        let lock = WriteLock::acquire(
                            &lock_path_for_store(path),
                            self.options.lock_stale_after,
                        )?;
                        self.lock = Some(lock);
                    }
                } else if self.baseline.is_none() {
                    self.baseline = Some(Box::new(self.data.clone()));
                }
                self.mode = StoreMode::Write;
            }
            StoreMode::Read => {
                self.commit()?;
                self.rebuild_read_index();
                if let Some(path) = &self.path {
                    write_document(&pending_path_for_store(path), &self.data.to_document())?;
                }
                self.has_unkept_changes = true;
                self.mode = StoreMode::Read;
            }
        }

        log::debug!("Symbol store switched to {mode} mode");
        Ok(())
    }

    /// Validate and apply buffered writes. Either everything becomes visible or nothing does.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_write("commit")?;
        if self.pending.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending);
        if let Err(detail) = self.validate(&pending) {
            log::warn!("Dropping inconsistent pending writes: {detail}");
            return Err(StoreError::mode_violation("commit", detail));
        }
        self.data.apply(pending);

        if let Some(lock) = &self.lock {
            if let Err(err) = lock.touch() {
                log::warn!("Failed to refresh store lock: {err}");
            }
        }
        Ok(())
    }

    fn validate(&self, pending: &PendingWrites) -> std::result::Result<(), String> {
        let file_known =
            |id: &FileId| self.data.files.contains_key(id) || pending.files.contains_key(id);
        let node_known =
            |id: &ElementId| self.data.nodes.contains_key(id) || pending.nodes.contains_key(id);

        if let Some(id) = pending.resets.iter().find(|id| !self.data.files.contains_key(id)) {
            return Err(format!("indexed-state reset for unknown {id}"));
        }
        for node in pending.nodes.values() {
            if let Some(file) = node.files.iter().find(|f| !file_known(f)) {
                return Err(format!("{} references unknown {file}", node.id));
            }
        }
        for (node, file) in &pending.contributions {
            if !self.data.nodes.contains_key(node) || !file_known(file) {
                return Err(format!("contribution of {file} to {node} is dangling"));
            }
        }
        for edge in pending.edges.values() {
            if !node_known(&edge.source) || !node_known(&edge.target) {
                return Err(format!(
                    "{} connects unknown endpoints {} -> {}",
                    edge.id, edge.source, edge.target
                ));
            }
            if !file_known(&edge.file) {
                return Err(format!("{} references unknown {}", edge.id, edge.file));
            }
        }
        if let Some(error) = pending.errors.iter().find(|e| !file_known(&e.location.file)) {
            return Err(format!(
                "error \"{}\" points into unknown {}",
                error.message, error.location.file
            ));
        }
        Ok(())
    }

    /// Remove everything the given files contributed: their records, errors, owned edges and
    /// node contributions. Returns the number of file records removed.
    pub fn clear_files(&mut self, paths: &[PathBuf]) -> Result<usize> {
        self.ensure_write("clear_files")?;
        if !self.pending.is_empty() {
            return Err(StoreError::mode_violation(
                "clear_files",
                "uncommitted writes must be committed before clearing",
            ));
        }

        let mut ids = HashSet::new();
        let mut cleared: HashSet<&Path> = HashSet::new();
        for path in paths {
            cleared.insert(path.as_path());
            if let Some(id) = self.data.file_ids.remove(path) {
                self.data.files.remove(&id);
                ids.insert(id);
            }
        }

        self.data.errors.retain(|e| {
            !ids.contains(&e.location.file) && !cleared.contains(e.source_file.as_path())
        });
        if ids.is_empty() {
            return Ok(0);
        }

        let mut removed_nodes = HashSet::new();
        self.data.nodes.retain(|id, node| {
            node.files.retain(|f| !ids.contains(f));
            if node.files.is_empty() {
                removed_nodes.insert(*id);
                false
            } else {
                true
            }
        });
        self.data.node_ids.retain(|_, id| !removed_nodes.contains(id));
        self.data.edges.retain(|_, e| {
            !ids.contains(&e.file)
                && !removed_nodes.contains(&e.source)
                && !removed_nodes.contains(&e.target)
        });

        Ok(ids.len())
    }

    pub fn clear_file(&mut self, path: &Path) -> Result<bool> {
        Ok(self.clear_files(&[path.to_path_buf()])? > 0)
    }

    /// Drop all content while keeping id counters monotonic.
    pub fn clear_all(&mut self) -> Result<()> {
        self.ensure_write("clear_all")?;
        if !self.pending.is_empty() {
            return Err(StoreError::mode_violation(
                "clear_all",
                "uncommitted writes must be committed before clearing",
            ));
        }
        self.data = StoreData {
            next_file_id: self.data.next_file_id,
            next_element_id: self.data.next_element_id,
            ..StoreData::default()
        };
        Ok(())
    }

    /// Replay a unit collected by a worker, translating its local ids, and commit it.
    pub fn apply_unit(&mut self, unit: CollectedUnit) -> Result<AppliedUnit> {
        self.ensure_write("apply_unit")?;
        self.commit()?;

        match self.replay_unit(unit) {
            Ok(applied) => {
                self.commit()?;
                Ok(applied)
            }
            Err(err) => {
                self.pending = PendingWrites::default();
                Err(err)
            }
        }
    }

    fn replay_unit(&mut self, unit: CollectedUnit) -> Result<AppliedUnit> {
        let CollectedUnit {
            source_file,
            files: unit_files,
            symbols,
            errors,
        } = unit;

        let mut files = Vec::with_capacity(unit_files.len());
        for (path, reset) in &unit_files {
            files.push(self.record_file(path, *reset)?);
        }
        let map_file = |local: FileId| -> Result<FileId> {
            local
                .0
                .checked_sub(1)
                .and_then(|i| files.get(usize::try_from(i).ok()?))
                .copied()
                .ok_or_else(|| StoreError::InvalidUnit(format!("unit-local {local} is unknown")))
        };

        let mut elements: Vec<ElementId> = Vec::with_capacity(symbols.len());
        let map_element = |elements: &[ElementId], local: ElementId| -> Result<ElementId> {
            local
                .0
                .checked_sub(1)
                .and_then(|i| elements.get(usize::try_from(i).ok()?))
                .copied()
                .ok_or_else(|| {
                    StoreError::InvalidUnit(format!("unit-local {local} is not recorded yet"))
                })
        };

        let symbol_count = symbols.len();
        for record in symbols {
            let mapped = match record {
                SymbolRecord::Node(node) => SymbolRecord::Node(NodeRecord {
                    file: map_file(node.file)?,
                    ..node
                }),
                SymbolRecord::Edge(edge) => SymbolRecord::Edge(EdgeRecord {
                    source: map_element(&elements, edge.source)?,
                    target: map_element(&elements, edge.target)?,
                    file: map_file(edge.file)?,
                    ..edge
                }),
            };
            elements.push(self.record_symbol(mapped)?);
        }

        let error_count = errors.len();
        let mut fatal_error_count = 0;
        for error in errors {
            if error.is_fatal {
                fatal_error_count += 1;
            }
            let location = ParseLocation {
                file: map_file(error.location.file)?,
                ..error.location
            };
            self.record_error(ErrorRecord { location, ..error })?;
        }

        let source_file = unit_files
            .iter()
            .position(|(path, _)| *path == source_file)
            .and_then(|i| files.get(i).copied());

        Ok(AppliedUnit {
            source_file,
            symbol_count,
            error_count,
            fatal_error_count,
        })
    }

    /// Store the fingerprint and the indexed-successfully flag of a committed file.
    pub fn mark_file(
        &mut self,
        path: &Path,
        fingerprint: Option<Fingerprint>,
        indexed: bool,
    ) -> Result<()> {
        self.ensure_write("mark_file")?;
        let record = if let Some(id) = self.data.file_ids.get(path) {
            self.data.files.get_mut(id)
        } else if let Some(id) = self.pending.file_ids.get(path) {
            self.pending.files.get_mut(id)
        } else {
            None
        };
        let record = record.ok_or_else(|| StoreError::UnknownFile(path.to_path_buf()))?;
        record.fingerprint = fingerprint;
        record.indexed = indexed;
        Ok(())
    }

    pub fn get_error_count(&self) -> Result<ErrorCountInfo> {
        self.ensure_read("get_error_count")?;
        let fatal = self.data.errors.iter().filter(|e| e.is_fatal).count();
        Ok(ErrorCountInfo {
            total: self.data.errors.len() as u64,
            fatal: fatal as u64,
        })
    }

    pub fn get_storage_stats(&self) -> Result<StorageStats> {
        self.ensure_read("get_storage_stats")?;
        let completed = self.data.files.values().filter(|f| f.indexed).count();
        Ok(StorageStats {
            file_count: self.data.files.len() as u64,
            completed_file_count: completed as u64,
            node_count: self.data.nodes.len() as u64,
            edge_count: self.data.edges.len() as u64,
            error_count: self.data.errors.len() as u64,
        })
    }

    /// Compact the committed graph: drop orphaned nodes, dangling or duplicate edges and
    /// duplicate errors, release spare capacity and rewrite the on-disk document.
    pub fn optimize_memory(&mut self) -> Result<CompactionStats> {
        self.ensure_read("optimize_memory")?;
        let started = Instant::now();
        let nodes_before = self.data.nodes.len();
        let edges_before = self.data.edges.len();
        let errors_before = self.data.errors.len();

        self.data.nodes.retain(|_, node| !node.files.is_empty());
        let nodes = &self.data.nodes;
        let files = &self.data.files;
        self.data.node_ids.retain(|_, id| nodes.contains_key(id));

        let mut seen_edges = HashSet::new();
        self.data.edges.retain(|_, e| {
            nodes.contains_key(&e.source)
                && nodes.contains_key(&e.target)
                && files.contains_key(&e.file)
                && seen_edges.insert((e.source, e.target, e.kind, e.file))
        });

        let mut seen_errors = HashSet::new();
        self.data.errors.retain(|e| {
            files.contains_key(&e.location.file)
                && seen_errors.insert((e.message.clone(), e.location, e.source_file.clone()))
        });

        self.data.errors.shrink_to_fit();
        self.data.file_ids.shrink_to_fit();
        self.data.node_ids.shrink_to_fit();
        self.rebuild_read_index();

        if let Some(path) = &self.path {
            let target = if self.has_unkept_changes {
                pending_path_for_store(path)
            } else {
                path.clone()
            };
            write_document(&target, &self.data.to_document())?;
        }

        let stats = CompactionStats {
            removed_nodes: nodes_before - self.data.nodes.len(),
            removed_edges: edges_before - self.data.edges.len(),
            removed_errors: errors_before - self.data.errors.len(),
            duration: started.elapsed(),
        };
        log::debug!("Symbol store compacted: {stats:?}");
        Ok(stats)
    }

    /// Accept the state written by the last write session.
    ///
    /// The write lock taken for that session is released once the pending document has been
    /// moved over the store file.
    pub fn keep(&mut self) -> Result<()> {
        self.ensure_read("keep")?;
        if let Some(path) = &self.path {
            let pending = pending_path_for_store(path);
            if pending.exists() {
                fs::rename(&pending, path)?;
            } else if self.has_unkept_changes {
                return Err(StoreError::PendingStateLost { path: pending });
            }
        }
        self.baseline = None;
        self.has_unkept_changes = false;
        self.lock = None;
        Ok(())
    }

    /// Throw away everything written since the last kept state.
    pub fn discard(&mut self) -> Result<()> {
        self.ensure_read("discard")?;
        if let Some(path) = self.path.clone() {
            let pending = pending_path_for_store(&path);
            if pending.exists() {
                fs::remove_file(&pending)?;
            }
            self.data = read_document(&path)?.map_or_else(StoreData::default, StoreData::from_document);
        } else if let Some(baseline) = self.baseline.take() {
            self.data = *baseline;
        }
        self.has_unkept_changes = false;
        self.lock = None;
        self.rebuild_read_index();
        Ok(())
    }

    pub fn file_records(&self) -> Result<Vec<FileRecord>> {
        self.ensure_read("file_records")?;
        Ok(self.data.files.values().cloned().collect())
    }

    pub fn has_files(&self) -> Result<bool> {
        self.ensure_read("has_files")?;
        Ok(!self.data.files.is_empty())
    }

    pub fn file(&self, path: &Path) -> Result<Option<&FileRecord>> {
        self.ensure_read("file")?;
        Ok(self
            .data
            .file_ids
            .get(path)
            .and_then(|id| self.data.files.get(id)))
    }

    pub fn find_symbol(&self, name: &str) -> Result<Vec<&SymbolNode>> {
        self.ensure_read("find_symbol")?;
        Ok(self
            .read_index
            .find(name)
            .iter()
            .filter_map(|id| self.data.nodes.get(id))
            .collect())
    }

    pub fn outgoing(&self, id: ElementId) -> Result<Vec<(ElementId, EdgeKind)>> {
        self.ensure_read("outgoing")?;
        Ok(self.read_index.outgoing(id))
    }

    pub fn incoming(&self, id: ElementId) -> Result<Vec<(ElementId, EdgeKind)>> {
        self.ensure_read("incoming")?;
        Ok(self.read_index.incoming(id))
    }

    pub fn errors(&self) -> Result<&[ErrorRecord]> {
        self.ensure_read("errors")?;
        Ok(&self.data.errors)
    }

    /// Files that directly include or import `path`.
    pub fn dependents_of(&self, path: &Path) -> Result<BTreeSet<PathBuf>> {
        self.ensure_read("dependents_of")?;
        Ok(self.dependents.get(path).cloned().unwrap_or_default())
    }

    fn rebuild_read_index(&mut self) {
        self.read_index = SymbolGraph::build(self.data.nodes.values(), self.data.edges.values());
        self.dependents.clear();
        for record in self.data.files.values() {
            for dependency in &record.dependencies {
                self.dependents
                    .entry(dependency.clone())
                    .or_default()
                    .insert(record.path.clone());
            }
        }

        let (nodes, edges) = self.read_index.stats();
        log::debug!(
            "Built symbol read index: {nodes} nodes, {edges} edges, {} included files",
            self.dependents.len()
        );
    }

    fn ensure_write(&self, operation: &'static str) -> Result<()> {
        match self.mode {
            StoreMode::Write => Ok(()),
            StoreMode::Read => Err(StoreError::mode_violation(
                operation,
                "store is in read mode",
            )),
        }
    }

    fn ensure_read(&self, operation: &'static str) -> Result<()> {
        match self.mode {
            StoreMode::Read => Ok(()),
            StoreMode::Write => Err(StoreError::mode_violation(
                operation,
                "store is in write mode",
            )),
        }
    }
}

impl ParserClient for PersistentSymbolStore {
    fn record_file(&mut self, path: &Path, reset_indexed_state: bool) -> Result<FileId> {
        self.ensure_write("record_file")?;

        if let Some(&id) = self.data.file_ids.get(path) {
            if reset_indexed_state {
                self.pending.resets.insert(id);
            }
            return Ok(id);
        }
        if let Some(&id) = self.pending.file_ids.get(path) {
            if reset_indexed_state {
                if let Some(record) = self.pending.files.get_mut(&id) {
                    record.indexed = false;
                }
            }
            return Ok(id);
        }

        let id = self.data.allocate_file_id();
        self.pending.file_ids.insert(path.to_path_buf(), id);
        self.pending.files.insert(id, FileRecord::new(path));
        Ok(id)
    }

    fn record_symbol(&mut self, record: SymbolRecord) -> Result<ElementId> {
        self.ensure_write("record_symbol")?;

        match record {
            SymbolRecord::Node(node) => {
                let key = (node.kind, node.name);
                if let Some(&id) = self.data.node_ids.get(&key) {
                    self.pending.contributions.push((id, node.file));
                    return Ok(id);
                }
                if let Some(&id) = self.pending.node_ids.get(&key) {
                    if let Some(existing) = self.pending.nodes.get_mut(&id) {
                        existing.files.insert(node.file);
                    }
                    return Ok(id);
                }

                let id = self.data.allocate_element_id();
                self.pending.nodes.insert(
                    id,
                    SymbolNode {
                        id,
                        name: key.1.clone(),
                        kind: key.0,
                        position: node.position,
                        files: BTreeSet::from([node.file]),
                    },
                );
                self.pending.node_ids.insert(key, id);
                Ok(id)
            }
            SymbolRecord::Edge(edge) => {
                let id = self.data.allocate_element_id();
                self.pending.edges.insert(
                    id,
                    SymbolEdge {
                        id,
                        source: edge.source,
                        target: edge.target,
                        kind: edge.kind,
                        file: edge.file,
                        position: edge.position,
                    },
                );
                Ok(id)
            }
        }
    }

    fn record_error(&mut self, error: ErrorRecord) -> Result<()> {
        self.ensure_write("record_error")?;
        self.pending.errors.push(error);
        Ok(())
    }
}
