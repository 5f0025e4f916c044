//! The tasks a pipeline run is made of, in execution order.

mod clear;
mod finish;
mod index_files;
mod validate_includes;

pub use clear::ClearStaleEntries;
pub use finish::FinishRun;
pub use index_files::IndexFiles;
pub use validate_includes::{IncludeValidationRequest, ValidateIncludes};

use srcgraph_store::{PersistentSymbolStore, StoreMode};

/// Put the store back into read mode after an abnormal end.
///
/// A failing commit drops the inconsistent pending writes, so a second attempt only has to
/// persist what was already committed.
pub(crate) fn release_store(store: &mut PersistentSymbolStore) {
    if store.mode() == StoreMode::Read {
        return;
    }
    if let Err(first) = store.set_mode(StoreMode::Read) {
        log::warn!("Could not switch the symbol store to read mode: {first}");
        if let Err(second) = store.set_mode(StoreMode::Read) {
            log::error!("Symbol store is stuck in write mode: {second}");
        }
    }
}
