//! # srcgraph store
//!
//! Durable symbol graph with a single read/write gate.
//!
//! ## Write path
//!
//! ```text
//! Parser front end
//!     │
//!     ├──> UnitCollector (worker thread, unit-local ids)
//!     │      └─> CollectedUnit ──channel──┐
//!     │                                   │
//!     └──> PersistentSymbolStore <────────┘ apply_unit (write-token holder)
//!            ├─> pending writes ── commit (validate, all or nothing)
//!            └─> set_mode(Read) ── read index + <store>.pending
//!                                     └─> keep() / discard()
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use srcgraph_store::{ParserClient, PersistentSymbolStore, StoreMode};
//! use std::path::Path;
//!
//! fn main() -> srcgraph_store::Result<()> {
//!     let mut store = PersistentSymbolStore::open("/tmp/project/symbols.json")?;
//!     store.set_mode(StoreMode::Write)?;
//!     store.record_file(Path::new("/tmp/project/main.c"), true)?;
//!     store.set_mode(StoreMode::Read)?;
//!     store.keep()?;
//!
//!     let stats = store.get_storage_stats()?;
//!     println!("{} files", stats.file_count);
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod graph;
mod lock;
mod persist;
mod store;
mod types;

pub use client::{CollectedUnit, ParserClient, UnitCollector};
pub use error::{Result, StoreError};
pub use graph::SymbolGraph;
pub use lock::WriteLock;
pub use persist::{
    lock_path_for_store, pending_path_for_store, StoreDocument, StoredFile,
    STORAGE_FORMAT_VERSION,
};
pub use store::{AppliedUnit, CompactionStats, PersistentSymbolStore, StoreOptions};
pub use types::{
    EdgeKind, EdgeRecord, ElementId, ErrorCountInfo, ErrorRecord, FileId, FileRecord,
    Fingerprint, NodeRecord, ParseLocation, SourcePosition, StorageStats, StoreMode, SymbolEdge,
    SymbolKind, SymbolNode, SymbolRecord,
};
